//! volt profile commands

use clap::Subcommand;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use volt_core::{normalize_repos, LockJson, ProfileChange};

use crate::Request;

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Enable repositories in a profile
    Add {
        /// Profile name
        name: String,

        /// Repositories to enable
        #[arg(required = true, value_name = "REPOSITORY")]
        repos: Vec<String>,
    },

    /// List profiles and their enabled repositories
    List,
}

impl ProfileCommand {
    pub fn into_request(self) -> volt_core::Result<Request> {
        match self {
            ProfileCommand::Add { name, repos } => Ok(Request::ProfileAdd {
                name,
                repos_paths: repos
                    .iter()
                    .map(|r| normalize_repos(r))
                    .collect::<volt_core::Result<_>>()?,
            }),
            ProfileCommand::List => Ok(Request::ProfileList),
        }
    }
}

/// Table row for `volt profile list`
#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Repositories")]
    repos: String,
}

fn profile_rows(lock: &LockJson) -> Vec<ProfileRow> {
    lock.profiles
        .iter()
        .map(|profile| ProfileRow {
            name: profile.name.clone(),
            current: if profile.name == lock.current_profile_name {
                "*".to_string()
            } else {
                String::new()
            },
            repos: if profile.repos_path.is_empty() {
                "(none)".to_string()
            } else {
                profile
                    .repos_path
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            },
        })
        .collect()
}

pub fn print_profiles(lock: &LockJson) {
    let table = Table::new(profile_rows(lock))
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();

    println!("{table}");
}

pub fn print_change(change: &ProfileChange) {
    for repos_path in &change.added {
        println!("Enabled '{}' in profile '{}'", repos_path, change.profile);
    }
    if change.is_noop() {
        println!("Nothing to do: profile '{}' is unchanged.", change.profile);
    }
}
