//! Built-in plans
//!
//! The three setups the recommendation pipeline has been deployed with.
//! Collection names are kept exactly as each deployment spells them, so
//! `auteurs`/`authors` and `publications`/`Publications` both appear.

use clap::ValueEnum;

use super::{BootstrapPlan, IndexSpec, RoleGrant, UserSpec};

/// Database shared by every preset
pub const DEFAULT_DATABASE: &str = "Donnees";

/// Application user created by the `recommendations` preset
pub const APP_USER: &str = "app_user";

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    /// publications, auteurs, recommendations + app user + indexes
    Recommendations,
    /// authors, Publications, Statistiques
    ScholarExtraction,
    /// auteurs, Publications, Statistiques, SearchHistory
    ContentModel,
}

impl Preset {
    /// Build the plan for this preset
    ///
    /// `app_user_password` only matters for `Recommendations`; without it
    /// the user step is left out.
    pub fn plan(self, app_user_password: Option<&str>) -> BootstrapPlan {
        match self {
            Self::Recommendations => {
                let plan = BootstrapPlan::new(DEFAULT_DATABASE)
                    .collection("publications")
                    .collection("auteurs")
                    .collection("recommendations");

                let plan = match app_user_password {
                    Some(password) => plan.user(UserSpec::new(
                        APP_USER,
                        password,
                        vec![RoleGrant::read_write(DEFAULT_DATABASE)],
                    )),
                    None => plan,
                };

                plan.index(IndexSpec::text("publications", "title"))
                    .index(IndexSpec::ascending("publications", "authors"))
                    .index(IndexSpec::ascending("auteurs", "name").unique())
            }
            Self::ScholarExtraction => BootstrapPlan::new(DEFAULT_DATABASE)
                .collection("authors")
                .collection("Publications")
                .collection("Statistiques"),
            Self::ContentModel => BootstrapPlan::new(DEFAULT_DATABASE)
                .collection("auteurs")
                .collection("Publications")
                .collection("Statistiques")
                .collection("SearchHistory"),
        }
    }

    /// Whether the preset declares a user step
    pub fn wants_user(self) -> bool {
        matches!(self, Self::Recommendations)
    }
}
