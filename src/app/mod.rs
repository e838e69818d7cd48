pub mod ports;
pub mod provision_use_case;
pub mod relay_use_case;
pub mod translate_use_case;
pub mod write_use_case;
