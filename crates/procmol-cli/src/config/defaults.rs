pub struct DefaultsConfig {
    pub iterations: u64,
    pub prefix: String,
    pub on_failure: String,
    pub configuration_name: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            iterations: 1,
            prefix: "procmol".to_string(),
            on_failure: "abort".to_string(),
            configuration_name: "Configuration".to_string(),
        }
    }
}
