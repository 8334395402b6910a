use tweakship::{ClientConfig, ConfigRequest};

#[tokio::main]
pub async fn main() -> tweakship::Result<()> {
    env_logger::init();

    let host = std::env::var("TWEAKSHIP_HOST").unwrap();
    let project_id = std::env::var("TWEAKSHIP_PROJECT_ID").unwrap();

    let client = tweakship::Client::default();
    client
        .configure(ClientConfig::new(host, project_id))
        .set_context([("platform", "rust")]);

    // Preload configs. Values not returned by the server fall back to the defaults below.
    let results = client
        .get_multiple_remote_configs_async([
            ConfigRequest::new("banner_text", "Welcome!"),
            ConfigRequest::new("max_items", 10),
        ])
        .await?;
    for result in results {
        println!("{} = {:?} ({:?})", result.name, result.value, result.loaded_from);
    }

    // Read from memory without another request.
    let dark_mode = client.get_feature_toggle("dark_mode", false);
    println!("Dark mode: {:?}", dark_mode.value);

    Ok(())
}
