//! Medbook CLI Module
//! Command-line interface: server operations and an API client

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod dashboard;
pub mod formatter;

#[derive(Parser, Debug)]
#[command(name = "medbook")]
#[command(author = "Medbook Team")]
#[command(version)]
#[command(about = "Medical appointment booking: API server and client", long_about = None)]
pub struct Cli {
    /// Directory holding medbook.config.json (defaults to current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (json for scripting)
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// API base URL for client commands (defaults to the logged-in server)
    #[arg(short, long, global = true)]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a configuration file with a fresh signing secret
    Init {
        /// Run mode recorded in the file (development or production)
        #[arg(short, long, default_value = "production")]
        mode: String,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Start the API server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
    },

    /// Schema migration commands
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },

    /// Operator account management (direct database access)
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },

    /// Log in and remember the session
    Login {
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Create a patient or doctor account
    Register {
        email: String,

        /// Full name
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        password: String,

        /// patient or doctor
        #[arg(short, long, default_value = "patient")]
        role: String,

        #[arg(long)]
        phone: Option<String>,
    },

    /// Show the logged-in user
    Whoami,

    /// List doctors
    Doctors,

    /// Role-specific overview
    Dashboard,

    /// Appointment commands
    Appointments {
        #[command(subcommand)]
        action: AppointmentAction,
    },

    /// User management (administrators)
    Users {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum MigrateAction {
    /// Show applied and pending migrations
    Status,
}

#[derive(Subcommand, Debug)]
pub enum AdminAction {
    /// Create an administrator account
    Create {
        email: String,

        /// Full name
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        password: String,

        #[arg(long)]
        phone: Option<String>,
    },

    /// Set a new password for any account
    ResetPassword {
        email: String,

        #[arg(short, long)]
        password: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum AppointmentAction {
    /// List your appointments
    List,

    /// Book an appointment with a doctor
    Book {
        /// Doctor id (see `medbook doctors`)
        doctor_id: i64,

        /// Date and time, e.g. 2025-06-01T10:00
        date: String,

        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Change an appointment's status
    Status {
        id: i64,

        /// confirmed, cancelled or completed
        status: String,
    },

    /// Cancel an appointment
    Cancel { id: i64 },

    /// Delete an appointment
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum UserAction {
    /// Search by name, e-mail or username
    Search {
        #[arg(short, long)]
        query: Option<String>,

        #[arg(short, long)]
        role: Option<String>,
    },

    /// List every user
    List,

    /// Delete a user and their appointments
    Delete { id: i64 },
}

impl Cli {
    pub fn get_config_dir(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}
