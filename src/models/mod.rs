//! Data models for rapidstock.
//!
//! Record types owned by the system of record, their input types, and the
//! search documents they project into.

mod attribute;
mod category;
mod document;
mod entity;
mod product;

pub use attribute::{Attribute, NewAttribute};
pub use category::{Category, NewCategory};
pub use document::{Document, Indexable, PRIMARY_KEY, project_all};
pub use entity::EntityKind;
pub use product::{NewProduct, Product, ProductDetail, ProductReplacement};
