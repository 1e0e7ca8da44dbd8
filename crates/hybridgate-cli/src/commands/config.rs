use std::process::ExitCode;

use hybridgate_core::GatewayConfig;

use crate::error::CliError;

pub fn run(config: &GatewayConfig) -> Result<ExitCode, CliError> {
    print!("{}", render(config)?);
    Ok(ExitCode::SUCCESS)
}

fn render(config: &GatewayConfig) -> Result<String, CliError> {
    Ok(toml::to_string_pretty(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_config_round_trips_without_the_key() {
        let mut config = GatewayConfig::default();
        config.premium.api_key = Some(String::from("k-secret"));
        config.premium.base_url = Some(String::from("https://premium.test"));

        let rendered = render(&config).expect("renders");
        assert!(!rendered.contains("k-secret"));

        let parsed = GatewayConfig::from_toml(&rendered).expect("parses back");
        assert_eq!(parsed.premium.base_url, config.premium.base_url);
        assert_eq!(parsed.premium.api_key, None);
        assert_eq!(parsed.rate_limits, config.rate_limits);
    }
}
