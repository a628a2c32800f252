//! Catalog CLI commands: categories, products, attributes.

use crate::models::{Attribute, NewAttribute, NewCategory, NewProduct, Product, ProductDetail};
use crate::services::CatalogService;
use std::io::Write;

/// Parses repeated `--attr name=value` arguments.
///
/// # Errors
///
/// Returns an error on the first malformed pair.
pub fn parse_attributes(pairs: &[String]) -> crate::Result<Vec<NewAttribute>> {
    pairs.iter().map(|pair| NewAttribute::parse_pair(pair)).collect()
}

fn write_product(out: &mut impl Write, detail: &ProductDetail) -> std::io::Result<()> {
    let Product {
        id,
        name,
        description,
        category_id,
    } = &detail.product;
    writeln!(out, "Product {id}: {name}")?;
    writeln!(out, "  Category: {category_id}")?;
    if let Some(description) = description {
        writeln!(out, "  Description: {description}")?;
    }
    if !detail.attributes.is_empty() {
        writeln!(out, "  Attributes:")?;
        for attribute in &detail.attributes {
            writeln!(out, "    [{}] {} = {}", attribute.id, attribute.name, attribute.value)?;
        }
    }
    Ok(())
}

fn write_attribute(out: &mut impl Write, verb: &str, attribute: &Attribute) -> std::io::Result<()> {
    writeln!(
        out,
        "{verb} attribute {} on product {}: {} = {}",
        attribute.id, attribute.product_id, attribute.name, attribute.value
    )
}

/// Adds a category.
///
/// # Errors
///
/// Returns an error if the write is rejected.
pub fn cmd_category_add(
    catalog: &CatalogService,
    name: String,
    description: Option<String>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let category = catalog.create_category(&NewCategory { name, description })?;
    writeln!(out, "Created category {}: {}", category.id, category.name)?;
    Ok(())
}

/// Updates a category.
///
/// # Errors
///
/// Returns an error if the category does not exist or the write is rejected.
pub fn cmd_category_update(
    catalog: &CatalogService,
    id: i64,
    name: String,
    description: Option<String>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let category = catalog.update_category(id, &NewCategory { name, description })?;
    writeln!(out, "Updated category {}: {}", category.id, category.name)?;
    Ok(())
}

/// Deletes a category.
///
/// # Errors
///
/// Returns an error if the category does not exist or is still referenced.
pub fn cmd_category_delete(catalog: &CatalogService, id: i64, out: &mut impl Write) -> anyhow::Result<()> {
    catalog.delete_category(id)?;
    writeln!(out, "Deleted category {id}")?;
    Ok(())
}

/// Lists categories.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn cmd_category_list(catalog: &CatalogService, out: &mut impl Write) -> anyhow::Result<()> {
    let categories = catalog.list_categories()?;
    if categories.is_empty() {
        writeln!(out, "No categories found.")?;
        return Ok(());
    }
    writeln!(out, "{:<6} {:<30} DESCRIPTION", "ID", "NAME")?;
    for category in &categories {
        writeln!(
            out,
            "{:<6} {:<30} {}",
            category.id,
            category.name,
            category.description.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}

/// Adds a product with attributes.
///
/// # Errors
///
/// Returns an error if an attribute pair is malformed or the write is rejected.
pub fn cmd_product_add(
    catalog: &CatalogService,
    name: String,
    description: Option<String>,
    category_id: i64,
    attrs: &[String],
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let input = NewProduct {
        name,
        description,
        category_id,
        attributes: parse_attributes(attrs)?,
    };
    let detail = catalog.create_product(&input)?;
    writeln!(out, "Created product {}", detail.product.id)?;
    write_product(out, &detail)?;
    Ok(())
}

/// Replaces a product and its attributes.
///
/// # Errors
///
/// Returns an error if an attribute pair is malformed or the write is rejected.
pub fn cmd_product_update(
    catalog: &CatalogService,
    id: i64,
    name: String,
    description: Option<String>,
    category_id: i64,
    attrs: &[String],
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let input = NewProduct {
        name,
        description,
        category_id,
        attributes: parse_attributes(attrs)?,
    };
    let detail = catalog.update_product(id, &input)?;
    writeln!(out, "Updated product {}", detail.product.id)?;
    write_product(out, &detail)?;
    Ok(())
}

/// Deletes a product and its attributes.
///
/// # Errors
///
/// Returns an error if the product does not exist.
pub fn cmd_product_delete(catalog: &CatalogService, id: i64, out: &mut impl Write) -> anyhow::Result<()> {
    catalog.delete_product(id)?;
    writeln!(out, "Deleted product {id}")?;
    Ok(())
}

/// Lists products.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn cmd_product_list(catalog: &CatalogService, out: &mut impl Write) -> anyhow::Result<()> {
    let products = catalog.list_products()?;
    if products.is_empty() {
        writeln!(out, "No products found.")?;
        return Ok(());
    }
    writeln!(out, "{:<6} {:<30} {:<9} DESCRIPTION", "ID", "NAME", "CATEGORY")?;
    for product in &products {
        writeln!(
            out,
            "{:<6} {:<30} {:<9} {}",
            product.id,
            product.name,
            product.category_id,
            product.description.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}

/// Shows a product with its attributes.
///
/// # Errors
///
/// Returns an error if the product does not exist.
pub fn cmd_product_show(catalog: &CatalogService, id: i64, out: &mut impl Write) -> anyhow::Result<()> {
    let detail = catalog.get_product(id)?;
    write_product(out, &detail)?;
    Ok(())
}

/// Adds an attribute to a product.
///
/// # Errors
///
/// Returns an error if the product does not exist or the name is blank.
pub fn cmd_attribute_add(
    catalog: &CatalogService,
    product_id: i64,
    name: String,
    value: String,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let attribute = catalog.create_attribute(product_id, &NewAttribute { name, value })?;
    write_attribute(out, "Created", &attribute)?;
    Ok(())
}

/// Updates an attribute.
///
/// # Errors
///
/// Returns an error if the attribute does not exist or the name is blank.
pub fn cmd_attribute_update(
    catalog: &CatalogService,
    id: i64,
    name: String,
    value: String,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let attribute = catalog.update_attribute(id, &NewAttribute { name, value })?;
    write_attribute(out, "Updated", &attribute)?;
    Ok(())
}

/// Deletes an attribute.
///
/// # Errors
///
/// Returns an error if the attribute does not exist.
pub fn cmd_attribute_delete(catalog: &CatalogService, id: i64, out: &mut impl Write) -> anyhow::Result<()> {
    catalog.delete_attribute(id)?;
    writeln!(out, "Deleted attribute {id}")?;
    Ok(())
}
