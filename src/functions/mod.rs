//! Function catalog: capabilities exposed to the model for calling.

pub mod arguments;
pub mod function;
pub mod parameters;

pub use arguments::FunctionArguments;
pub use function::{Function, FunctionCatalog};
pub use parameters::{FunctionParameters, ParameterBuilder};
