//! Medbook CLI - Main entry point for the `medbook` binary
//!
//! Server-side commands (`init`, `serve`, `migrate`, `admin`) work on the
//! local configuration directory; the rest talk to a running server.

use anyhow::{bail, Context};
use clap::Parser;
use medbook_lib::engine::{
    api::{appointments::AppointmentResponse, create_router, ApiState},
    appointments::CreateAppointmentRequest,
    auth::{AuthService, RegisterRequest},
    cli::{
        dashboard::{render_appointments, render_users, Dashboard},
        formatter::{format_appointment_date, or_dash, role_badge, status_badge, CliFormatter},
        AdminAction, AppointmentAction, Cli, Commands, MigrateAction, OutputFormat, UserAction,
    },
    client::{ClientError, MedbookClient, Session, SessionStore, DEFAULT_SERVER},
    config::{Config, CONFIG_FILE},
    database::Database,
    migrations::MigrationRunner,
    models::UserSummary,
    users::SearchQuery,
};
use serde::Serialize;
use std::path::Path;

fn main() {
    medbook_lib::init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run_cli(cli) {
        CliFormatter::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let config_dir = cli.get_config_dir();
    let json = cli.format == OutputFormat::Json;
    let server = cli.server.as_deref();

    match cli.command {
        Commands::Init { mode, force } => cmd_init(&config_dir, &mode, force, json),
        Commands::Serve { port, host } => cmd_serve(&config_dir, host, port),
        Commands::Migrate { action } => cmd_migrate(action, &config_dir, json),
        Commands::Admin { action } => cmd_admin(action, &config_dir, json),
        Commands::Login { email, password } => cmd_login(server, &email, &password, json),
        Commands::Logout => cmd_logout(json),
        Commands::Register {
            email,
            name,
            password,
            role,
            phone,
        } => {
            let request = RegisterRequest {
                email: Some(email),
                password: Some(password),
                name: Some(name),
                role: Some(role),
                phone,
            };
            cmd_register(server, &request, json)
        }
        Commands::Whoami => cmd_whoami(server, json),
        Commands::Doctors => cmd_doctors(server, json),
        Commands::Dashboard => cmd_dashboard(server, json),
        Commands::Appointments { action } => cmd_appointments(action, server, json),
        Commands::Users { action } => cmd_users(action, server, json),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// File, then environment, then invariants.
fn load_config(config_dir: &Path) -> anyhow::Result<Config> {
    let mut config = Config::load(config_dir)
        .with_context(|| format!("loading {}", config_dir.join(CONFIG_FILE).display()))?;
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

fn mode_name(config: &Config) -> &'static str {
    if config.mode.is_development() {
        "development"
    } else {
        "production"
    }
}

// Server-side commands

fn cmd_init(config_dir: &Path, mode: &str, force: bool, json: bool) -> anyhow::Result<()> {
    let config_path = config_dir.join(CONFIG_FILE);
    if config_path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", config_path.display());
    }

    let mut config = Config::default();
    config.mode = mode.parse()?;
    config.auth.jwt_secret = Some(format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    ));
    config.save(config_dir)?;

    let db_path = config.database_path(config_dir);
    Database::new(&db_path)?;

    if json {
        print_json(&serde_json::json!({
            "success": true,
            "config": config_path.display().to_string(),
            "database": db_path.display().to_string(),
            "mode": mode_name(&config),
        }))?;
    } else {
        CliFormatter::success(&format!("Wrote {}", config_path.display()));
        CliFormatter::kv("Mode", mode_name(&config));
        CliFormatter::kv("Database", &db_path.display().to_string());
        CliFormatter::blank();
        CliFormatter::info("Next steps:");
        CliFormatter::item("medbook admin create <email> --name <name> --password <password>");
        CliFormatter::item("medbook serve");
    }
    Ok(())
}

#[tokio::main]
async fn cmd_serve(config_dir: &Path, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = load_config(config_dir)?;
    if let Some(host) = host {
        config.api.host = host;
    }
    if let Some(port) = port {
        config.api.port = port;
    }

    let db_path = config.database_path(config_dir);
    let db = Database::new(&db_path)?;
    let app = create_router(ApiState::new(db, &config));

    let addr = config.bind_addr();
    CliFormatter::header("Medbook API Server");
    CliFormatter::kv("Mode", mode_name(&config));
    CliFormatter::kv("Database", &db_path.display().to_string());
    CliFormatter::kv("Listening", &format!("http://{}", addr));
    CliFormatter::kv("Docs", &format!("http://{}/api/docs", addr));
    CliFormatter::info("Press Ctrl+C to stop");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!(%addr, mode = mode_name(&config), "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutting down");
    }
}

fn cmd_migrate(action: MigrateAction, config_dir: &Path, json: bool) -> anyhow::Result<()> {
    match action {
        MigrateAction::Status => {
            let mut config = Config::load(config_dir)?;
            config.apply_env()?;
            let db_path = config.database_path(config_dir);
            let runner = MigrationRunner::embedded();

            // Opening through `Database` would apply pending migrations.
            let status = if db_path.exists() {
                runner.check(&rusqlite::Connection::open(&db_path)?)?
            } else {
                runner.check(&rusqlite::Connection::open_in_memory()?)?
            };

            if json {
                print_json(&status)?;
            } else {
                CliFormatter::header("Migration Status");
                CliFormatter::kv("Database", &db_path.display().to_string());
                CliFormatter::kv("Applied", &status.applied_count.to_string());
                CliFormatter::kv("Pending", &status.pending_count.to_string());
                for name in &status.pending_migrations {
                    CliFormatter::item(name);
                }
                if status.pending_count > 0 {
                    CliFormatter::info("Pending migrations are applied when the server starts");
                }
            }
        }
    }
    Ok(())
}

fn cmd_admin(action: AdminAction, config_dir: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_dir)?;
    let db = Database::new(&config.database_path(config_dir))?;
    let auth = AuthService::from_config(db, &config);

    match action {
        AdminAction::Create {
            email,
            name,
            password,
            phone,
        } => {
            let id = auth.create_admin(&email, &password, &name, phone.as_deref())?;
            if json {
                print_json(&serde_json::json!({ "success": true, "user_id": id }))?;
            } else {
                CliFormatter::success(&format!("Created administrator {} (id {})", email, id));
            }
        }
        AdminAction::ResetPassword { email, password } => {
            let id = auth.reset_password(&email, &password)?;
            if json {
                print_json(&serde_json::json!({ "success": true, "user_id": id }))?;
            } else {
                CliFormatter::success(&format!("Password updated for {}", email));
            }
        }
    }
    Ok(())
}

// Client commands

fn session_store() -> anyhow::Result<SessionStore> {
    Ok(SessionStore::default_location()?)
}

/// Client for public endpoints: explicit server, else the remembered one.
fn anonymous(server: Option<&str>) -> anyhow::Result<MedbookClient> {
    let remembered = session_store()
        .ok()
        .and_then(|store| store.load().ok().flatten())
        .map(|session| session.server);
    let base = server
        .map(str::to_string)
        .or(remembered)
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());
    Ok(MedbookClient::new(&base)?)
}

fn signed_in(server: Option<&str>) -> anyhow::Result<(MedbookClient, Session)> {
    let session = session_store()?.load()?.ok_or(ClientError::NotAuthenticated)?;
    let client = MedbookClient::new(server.unwrap_or(&session.server))?.with_token(session.token.clone());
    Ok((client, session))
}

fn print_user(user: &UserSummary) {
    CliFormatter::kv("ID", &user.id.to_string());
    CliFormatter::kv("Name", &user.full_name);
    CliFormatter::kv("Email", &user.email);
    CliFormatter::kv("Username", &user.username);
    CliFormatter::kv("Role", &role_badge(user.role).to_string());
    CliFormatter::kv("Phone", &or_dash(user.phone.as_deref()));
}

fn cmd_login(server: Option<&str>, email: &str, password: &str, json: bool) -> anyhow::Result<()> {
    let mut client = anonymous(server)?;
    let response = client.login(email, password)?;

    let store = session_store()?;
    store.save(&Session {
        server: client.base_url().to_string(),
        token: response.token.clone(),
        user: response.user.clone(),
    })?;

    if json {
        print_json(&serde_json::json!({
            "message": response.message,
            "user": response.user,
        }))?;
    } else {
        CliFormatter::success(&format!(
            "Logged in as {} ({})",
            response.user.full_name,
            role_badge(response.user.role)
        ));
        CliFormatter::kv("Session", &store.path().display().to_string());
    }
    Ok(())
}

fn cmd_logout(json: bool) -> anyhow::Result<()> {
    let existed = session_store()?.clear()?;
    if json {
        print_json(&serde_json::json!({ "success": existed }))?;
    } else if existed {
        CliFormatter::success("Logged out");
    } else {
        CliFormatter::info("No stored session");
    }
    Ok(())
}

fn cmd_register(server: Option<&str>, request: &RegisterRequest, json: bool) -> anyhow::Result<()> {
    let response = anonymous(server)?.register(request)?;
    if json {
        print_json(&response)?;
    } else {
        CliFormatter::success(&format!("{} (id {})", response.message, response.user_id));
        CliFormatter::info("Run `medbook login` to start a session");
    }
    Ok(())
}

fn cmd_whoami(server: Option<&str>, json: bool) -> anyhow::Result<()> {
    let (client, _) = signed_in(server)?;
    let response = client.verify()?;
    if json {
        print_json(&response)?;
    } else {
        CliFormatter::header("Current user");
        print_user(&response.user);
        CliFormatter::kv("Server", client.base_url());
    }
    Ok(())
}

fn cmd_doctors(server: Option<&str>, json: bool) -> anyhow::Result<()> {
    let doctors = anonymous(server)?.doctors()?;
    if json {
        return print_json(&doctors);
    }
    if doctors.is_empty() {
        CliFormatter::info("No doctors registered yet");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = doctors
        .iter()
        .map(|d| {
            vec![
                d.id.to_string(),
                d.full_name.clone(),
                d.email.clone(),
                or_dash(d.phone.as_deref()),
            ]
        })
        .collect();
    CliFormatter::table(&["ID", "Name", "Email", "Phone"], &rows);
    Ok(())
}

fn cmd_dashboard(server: Option<&str>, json: bool) -> anyhow::Result<()> {
    let (client, _) = signed_in(server)?;
    let dashboard = Dashboard::fetch(&client)?;
    if json {
        print_json(&dashboard)?;
    } else {
        dashboard.render();
    }
    Ok(())
}

fn cmd_appointments(action: AppointmentAction, server: Option<&str>, json: bool) -> anyhow::Result<()> {
    let (client, session) = signed_in(server)?;

    match action {
        AppointmentAction::List => {
            let appointments = client.appointments()?;
            if json {
                print_json(&appointments)?;
            } else {
                render_appointments(&session.user, &appointments);
            }
        }
        AppointmentAction::Book {
            doctor_id,
            date,
            reason,
        } => {
            let response = client.book(&CreateAppointmentRequest {
                doctor_id: Some(doctor_id),
                appointment_date: Some(date),
                reason,
            })?;
            if json {
                print_json(&response)?;
            } else {
                CliFormatter::success(&response.message);
                CliFormatter::kv("ID", &response.appointment.id.to_string());
                CliFormatter::kv("Date", &format_appointment_date(&response.appointment.appointment_date));
                CliFormatter::kv("Status", &status_badge(response.appointment.status).to_string());
            }
        }
        AppointmentAction::Status { id, status } => {
            let response = client.update_status(id, &status)?;
            report_status(&response, json)?;
        }
        AppointmentAction::Cancel { id } => {
            let response = client.update_status(id, "cancelled")?;
            report_status(&response, json)?;
        }
        AppointmentAction::Delete { id } => {
            let response = client.delete_appointment(id)?;
            if json {
                print_json(&response)?;
            } else {
                CliFormatter::success(&response.message);
            }
        }
    }
    Ok(())
}

fn report_status(response: &AppointmentResponse, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(response);
    }
    CliFormatter::success(&format!(
        "{}: appointment {} is now {}",
        response.message,
        response.appointment.id,
        status_badge(response.appointment.status)
    ));
    Ok(())
}

fn cmd_users(action: UserAction, server: Option<&str>, json: bool) -> anyhow::Result<()> {
    let (client, _) = signed_in(server)?;

    match action {
        UserAction::Search { query, role } => {
            let users = client.search_users(&SearchQuery { query, role })?;
            if json {
                print_json(&users)?;
            } else {
                render_users(&users);
            }
        }
        UserAction::List => {
            let users = client.admin_users()?;
            if json {
                print_json(&users)?;
            } else {
                render_users(&users);
            }
        }
        UserAction::Delete { id } => {
            let response = client.admin_delete_user(id)?;
            if json {
                print_json(&response)?;
            } else {
                CliFormatter::success(&response.message);
            }
        }
    }
    Ok(())
}
