use clap::Args;
use serde_json::Value;

use crate::cli::utils::{output_error, read_json_input};
use crate::cli::OutputFormat;
use crate::query::QueryOptions;

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[arg(help = "Collection to query")]
    pub collection: String,

    #[arg(long, short = 'f', default_value = "-", help = "Query JSON file, or - for stdin")]
    pub file: String,

    #[arg(long, env = "QUERYGATE_URL", default_value = "http://localhost:8082", help = "Gateway base URL")]
    pub url: String,

    #[arg(long, env = "QUERYGATE_TOKEN", hide_env_values = true, help = "Bearer token")]
    pub token: String,

    #[arg(long, help = "Tenant sent in the tenant header")]
    pub tenant: Option<String>,

    #[arg(long, default_value = "X-Client-Subdomain", help = "Name of the tenant header")]
    pub tenant_header: String,
}

pub async fn handle(args: QueryArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let body = read_json_input(&args.file)?;
    let options: QueryOptions = serde_json::from_value(body)?;

    let url = format!("{}/{}", args.url.trim_end_matches('/'), args.collection);
    let mut request = reqwest::Client::new().post(&url).bearer_auth(&args.token).json(&options);
    if let Some(tenant) = &args.tenant {
        request = request.header(args.tenant_header.as_str(), tenant.as_str());
    }

    let response = request.send().await?;
    let status = response.status();
    let payload: Value = response.json().await?;

    if !status.is_success() {
        let message = payload["error"].as_str().unwrap_or("request failed");
        output_error(&output_format, &format!("{} ({})", message, status), payload["details"].as_str())?;
        anyhow::bail!("query failed with status {}", status);
    }

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&payload)?),
        OutputFormat::Text => {
            let documents = payload["documents"].as_array().cloned().unwrap_or_default();
            println!("{} document(s) from '{}'", documents.len(), args.collection);
            for document in documents {
                println!("{}", document);
            }
        }
    }
    Ok(())
}
