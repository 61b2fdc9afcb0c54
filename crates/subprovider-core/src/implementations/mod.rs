pub mod debug;
pub mod fixed_gas;
