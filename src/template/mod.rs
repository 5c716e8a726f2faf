pub mod adhoc;
pub mod catalog;
pub mod constraint;
pub mod definition;

pub use catalog::TemplateCatalog;
pub use constraint::{Check, Constraint, DistanceBound};
pub use definition::{Difficulty, Template, TemplateKind, TemplateSummary};
