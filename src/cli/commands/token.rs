use clap::Args;
use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

#[derive(Args, Debug)]
pub struct TokenArgs {
    #[arg(help = "Subject (user id) placed in the token")]
    pub sub: String,

    #[arg(long, default_value = "member", help = "Role claim")]
    pub role: String,

    #[arg(long, help = "Tenant bound to the token (used in role mode)")]
    pub tenant: Option<String>,

    #[arg(long = "permission", short = 'p', help = "Permission claim; repeat for several")]
    pub permissions: Vec<String>,

    #[arg(long, default_value_t = 24, help = "Hours until the token expires")]
    pub expiry_hours: u64,

    #[arg(long, env = "JWT_SECRET", hide_env_values = true, help = "HMAC secret shared with the gateway")]
    pub secret: String,
}

pub fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut claims = Claims::new(args.sub, args.role, args.expiry_hours).with_permissions(args.permissions);
    if let Some(tenant) = args.tenant {
        claims = claims.with_tenant(tenant);
    }

    let token = generate_jwt(&claims, &args.secret)?;

    match output_format {
        OutputFormat::Json => output_success(
            &output_format,
            "Token generated",
            Some(json!({ "token": token, "claims": claims })),
        ),
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
    }
}
