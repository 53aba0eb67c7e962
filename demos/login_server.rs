//! Login server with a seeded admin account
//!
//! Run with: JWT_SECRET=change-me cargo run --example login_server --features http

use employee_auth::{
    AuthConfig, AuthGateway, AuthServer, Credentials, InMemoryUserStore, TokenCodec,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "employee_auth=debug".into()),
        )
        .init();

    let config = AuthConfig::from_env()?;
    tracing::info!(?config, "loaded auth config");

    let gateway = AuthGateway::with_system_clock(
        InMemoryUserStore::new(),
        TokenCodec::from_config(&config),
    );
    gateway.register(Credentials::new("admin", "admin-password"), ["ADMIN", "USER"])?;

    let addr = "127.0.0.1:8080";
    eprintln!("\nLog in with:");
    eprintln!("curl -X POST http://{}/api/auth/login \\", addr);
    eprintln!("  -H \"Content-Type: application/json\" \\");
    eprintln!("  -d '{{\"username\":\"admin\",\"password\":\"admin-password\"}}'");
    eprintln!("\nThen:");
    eprintln!(
        "curl http://{}/api/auth/me -H \"Authorization: Bearer <accessToken>\"\n",
        addr
    );

    AuthServer::new(gateway).serve(addr)?;
    Ok(())
}
