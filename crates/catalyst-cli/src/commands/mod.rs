mod deploy;

pub use deploy::DeployCommand;
