// Core modules implementing descriptor resolution, parsing, and error modeling.
pub mod descriptor;
pub mod document;
pub mod embedded;
pub mod error;
pub mod instance;
