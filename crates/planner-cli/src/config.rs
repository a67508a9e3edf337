use std::path::Path;

use planner_stream::{GenerateError, PlannerClientConfig};

/// Load `.env` from the crate directory and then the working directory.
pub fn init() {
    let _ = dotenvy::from_path(Path::new(
        format!("{}/.env", env!("CARGO_MANIFEST_DIR")).as_str(),
    ));
    dotenvy::dotenv().ok();
}

/// Client config from the environment, with `--base-url` taking precedence.
pub fn client_config(base_url: Option<&str>) -> Result<PlannerClientConfig, GenerateError> {
    let config = match base_url {
        Some(url) => {
            let mut config = PlannerClientConfig::new(url);
            if let Ok(token) = std::env::var("PLANNER_API_TOKEN")
                && !token.trim().is_empty()
            {
                config = config.api_token(token);
            }
            config
        }
        None => PlannerClientConfig::from_env()?,
    };
    Ok(config)
}
