use anyhow::{Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use telematics_client::config::{Overrides, Settings, USER_AGENT};
use telematics_client::runtime::{RealRuntime, Runtime};
use telematics_client::{
    ApiClient, Credentials, Event, EventKind, RefreshOutcome, ReqwestTransport, Response,
};

/// telematics - vehicle data from the command line
///
/// Client id and secret come from --client-id/--client-secret or the
/// TELEMATICS_CLIENT_ID/TELEMATICS_CLIENT_SECRET environment variables.
/// Tokens are kept in a credentials file and refreshed automatically.
///
/// Examples:
///   telematics authorize <CODE>          # Exchange an authorization code
///   telematics batch <ID> odometer fuel  # Read several endpoints at once
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// OAuth client id (also via TELEMATICS_CLIENT_ID)
    #[arg(
        long = "client-id",
        env = "TELEMATICS_CLIENT_ID",
        value_name = "ID",
        global = true
    )]
    pub client_id: Option<String>,

    /// OAuth client secret (also via TELEMATICS_CLIENT_SECRET)
    #[arg(
        long = "client-secret",
        env = "TELEMATICS_CLIENT_SECRET",
        hide_env_values = true,
        value_name = "SECRET",
        global = true
    )]
    pub client_secret: Option<String>,

    /// Redirect URI registered for the application (also via TELEMATICS_REDIRECT_URI)
    #[arg(
        long = "redirect-uri",
        env = "TELEMATICS_REDIRECT_URI",
        value_name = "URI",
        global = true
    )]
    pub redirect_uri: Option<String>,

    /// Authorization server URL (defaults to https://auth.smartcar.com/oauth/)
    #[arg(
        long = "auth-url",
        env = "TELEMATICS_AUTH_URL",
        value_name = "URL",
        global = true
    )]
    pub auth_url: Option<String>,

    /// Vehicle API URL (defaults to https://api.smartcar.com/v2.0/)
    #[arg(
        long = "api-url",
        env = "TELEMATICS_API_URL",
        value_name = "URL",
        global = true
    )]
    pub api_url: Option<String>,

    /// Credentials file (also via TELEMATICS_CREDENTIALS)
    #[arg(
        long = "credentials",
        short = 'c',
        env = "TELEMATICS_CREDENTIALS",
        value_name = "PATH",
        global = true
    )]
    pub credentials: Option<PathBuf>,

    /// Do not send requests when the token refresh fails
    #[arg(long = "abort-on-refresh-failure", global = true)]
    pub abort_on_refresh_failure: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            redirect_uri: self.redirect_uri.clone(),
            auth_url: self.auth_url.clone(),
            api_url: self.api_url.clone(),
            credentials_path: self.credentials.clone(),
            abort_on_refresh_failure: self.abort_on_refresh_failure,
        }
    }
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Exchange an authorization code and store the issued tokens
    Authorize(AuthorizeArgs),

    /// Exchange the stored refresh token for new tokens
    Refresh,

    /// List the vehicles the user granted access to
    Vehicles,

    /// Show a vehicle's make, model and year
    Info(VehicleArgs),

    /// Show a vehicle's last known location
    Location(VehicleArgs),

    /// Read several endpoints of one vehicle in a single request
    Batch(BatchArgs),
}

#[derive(clap::Args, Debug)]
pub struct AuthorizeArgs {
    /// Authorization code received on the redirect URI
    #[arg(value_name = "CODE")]
    pub code: String,
}

#[derive(clap::Args, Debug)]
pub struct VehicleArgs {
    /// Vehicle id
    #[arg(value_name = "ID")]
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct BatchArgs {
    /// Vehicle id
    #[arg(value_name = "ID")]
    pub id: String,

    /// Endpoint paths, e.g. odometer or /location
    #[arg(value_name = "PATH", required = true, num_args = 1..)]
    pub paths: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = RealRuntime;
    let settings = Settings::resolve(&runtime, cli.overrides())?;

    match cli.command {
        Commands::Authorize(args) => authorize(&settings, runtime, &args.code).await,
        Commands::Refresh => {
            let mut session = Session::connect(&settings, runtime)?;
            let outcome = session.client.refresh().await?;
            session.save_if_changed()?;
            if outcome != RefreshOutcome::Refreshed {
                bail!("Token refresh failed");
            }
            println!("{}", serde_json::to_string_pretty(session.client.credentials())?);
            Ok(())
        }
        Commands::Vehicles => {
            let mut session = Session::connect(&settings, runtime)?;
            let response = session.client.vehicles().await?;
            session.finish(&response)
        }
        Commands::Info(args) => {
            let mut session = Session::connect(&settings, runtime)?;
            let response = session.client.vehicle_info(&args.id).await?;
            session.finish(&response)
        }
        Commands::Location(args) => {
            let mut session = Session::connect(&settings, runtime)?;
            let response = session.client.vehicle_location(&args.id).await?;
            session.finish(&response)
        }
        Commands::Batch(args) => {
            let mut session = Session::connect(&settings, runtime)?;
            let response = session
                .client
                .batch(&args.id, args.paths.as_slice())
                .await?;
            session.finish(&response)
        }
    }
}

async fn authorize(settings: &Settings, runtime: RealRuntime, code: &str) -> Result<()> {
    let transport = Arc::new(ReqwestTransport::build(USER_AGENT, None)?);
    let result = settings
        .auth_client(transport)
        .exchange_authorization_code(code)
        .await?;

    let Some(bundle) = result.bundle().filter(|_| result.success) else {
        let error = result.provider_error().cloned().unwrap_or_default();
        bail!(
            "Authorization failed: {} {} {} {}",
            result.status_code,
            result.status_message,
            error.error,
            error.error_description.unwrap_or_default()
        );
    };

    let credentials = Credentials::from_bundle(bundle, runtime.now());
    settings.save_credentials(&runtime, &credentials)?;
    println!("{}", serde_json::to_string_pretty(bundle)?);
    Ok(())
}

/// An API client wired with the listeners this binary cares about.
struct Session<'a> {
    settings: &'a Settings,
    runtime: RealRuntime,
    client: ApiClient<ReqwestTransport, RealRuntime>,
    changed: Arc<AtomicBool>,
}

impl<'a> Session<'a> {
    fn connect(settings: &'a Settings, runtime: RealRuntime) -> Result<Self> {
        let credentials = settings.load_credentials(&runtime)?;
        let mut client = settings.api_client(runtime, credentials)?;

        let changed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&changed);
        client.on(EventKind::AccessTokenChanged, move |_| {
            flag.store(true, Ordering::SeqCst)
        });
        client.on(EventKind::RefreshTokenExpired, |event| {
            if let Event::RefreshTokenExpired(result) = event {
                eprintln!(
                    "warning: token refresh was refused ({} {}); run `telematics authorize <CODE>` again",
                    result.status_code, result.status_message
                );
            }
        });
        client.on(EventKind::AuthorizationDenied, |event| {
            if let Event::AuthorizationDenied(paths) = event {
                eprintln!(
                    "warning: permissions must be granted again for: {}",
                    paths.join(", ")
                );
            }
        });

        Ok(Self {
            settings,
            runtime,
            client,
            changed,
        })
    }

    fn save_if_changed(&self) -> Result<()> {
        if self.changed.load(Ordering::SeqCst) {
            self.settings
                .save_credentials(&self.runtime, self.client.credentials())?;
        }
        Ok(())
    }

    fn finish(self, response: &Response) -> Result<()> {
        self.save_if_changed()?;
        if !response.is_successful() {
            bail!("{}", response.error().unwrap_or("Request failed"));
        }
        let output = if response.is_batch() {
            response.batch_results().to_json()
        } else {
            response.body().clone()
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}
