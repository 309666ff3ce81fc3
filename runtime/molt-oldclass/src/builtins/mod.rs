pub mod classes;
pub mod compare;
pub mod instance;
pub mod operator;
