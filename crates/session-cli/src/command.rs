//! Command parsing and rendering.

use std::fmt;
use std::str::FromStr;

use crate::endpoint::Profile;
use crate::error::SessionError;

/// A site the user can browse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub id: String,
    pub name: String,
}

impl Site {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    ShowSites,
    SwitchSite(String),
    Login,
    Logout,
    ViewProfile,
}

impl FromStr for Command {
    type Err = SessionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut words = input.split_whitespace();
        let command = match words.next().unwrap_or_default() {
            "help" => Command::Help,
            "status" => Command::Status,
            "show-sites" => Command::ShowSites,
            "switch-site" => match words.next() {
                Some(id) => Command::SwitchSite(id.to_string()),
                None => return Err(SessionError::MissingArgument("switch-site")),
            },
            "login" => Command::Login,
            "logout" => Command::Logout,
            "view-profile" => Command::ViewProfile,
            other => return Err(SessionError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

/// What a command produced, rendered with `Display`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Help,
    Status {
        logged_in: Vec<String>,
        current: Option<String>,
    },
    Sites(Vec<Site>),
    Switched(Site),
    LoggedIn(String),
    LoggedOut(String),
    Profile(Profile),
}

const HELP: &str = "\
- status
- show-sites
- switch-site [id]
- login
- logout
- help
- view-profile";

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Help => f.write_str(HELP),
            Output::Status { logged_in, current } => {
                if logged_in.is_empty() {
                    write!(f, "You have not logged in to any site.")?;
                } else {
                    write!(f, "You're logged in to site {}.", logged_in.join(", "))?;
                }
                match current {
                    Some(id) => write!(f, "\nNow you're browsing {}.", id),
                    None => Ok(()),
                }
            }
            Output::Sites(sites) => {
                write!(f, "Available Sites")?;
                for site in sites {
                    write!(f, "\n- {}: Id[ {} ]", site.name, site.id)?;
                }
                Ok(())
            }
            Output::Switched(site) => {
                let rule = "/".repeat(35);
                write!(f, "{}\n【 {} 】\n{}", rule, site.name, rule)
            }
            Output::LoggedIn(id) => write!(f, "🚀Login to {}!!", id),
            Output::LoggedOut(id) => write!(f, "logout from {}", id),
            Output::Profile(profile) => write!(
                f,
                "- id: {}\n- name: {}\n- age: {}\n- profile: {}",
                profile.user_id, profile.name, profile.age, profile.profile
            ),
        }
    }
}
