mod column_definition;
pub mod query;

pub use column_definition::ColumnDefinition;
pub use column_definition::ColumnDefinitionBytes;
pub use column_definition::ColumnDefinitionTail;
pub use query::{Query, QueryEvent, write_query};

#[cfg(test)]
mod column_definition_test;
