use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Read,
    EditPosts,
    PublishPosts,
    EditOthersPosts,
    ModerateComments,
    ManageCategories,
    ManageOptions,
    ActivatePlugins,
    EditUsers,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Read => "read",
            Capability::EditPosts => "edit_posts",
            Capability::PublishPosts => "publish_posts",
            Capability::EditOthersPosts => "edit_others_posts",
            Capability::ModerateComments => "moderate_comments",
            Capability::ManageCategories => "manage_categories",
            Capability::ManageOptions => "manage_options",
            Capability::ActivatePlugins => "activate_plugins",
            Capability::EditUsers => "edit_users",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "read" => Some(Capability::Read),
            "edit_posts" => Some(Capability::EditPosts),
            "publish_posts" => Some(Capability::PublishPosts),
            "edit_others_posts" => Some(Capability::EditOthersPosts),
            "moderate_comments" => Some(Capability::ModerateComments),
            "manage_categories" => Some(Capability::ManageCategories),
            "manage_options" => Some(Capability::ManageOptions),
            "activate_plugins" => Some(Capability::ActivatePlugins),
            "edit_users" => Some(Capability::EditUsers),
            _ => None,
        }
    }
}

const ADMINISTRATOR_CAPABILITIES: &[Capability] = &[
    Capability::Read,
    Capability::EditPosts,
    Capability::PublishPosts,
    Capability::EditOthersPosts,
    Capability::ModerateComments,
    Capability::ManageCategories,
    Capability::ManageOptions,
    Capability::ActivatePlugins,
    Capability::EditUsers,
];
const EDITOR_CAPABILITIES: &[Capability] = &[
    Capability::Read,
    Capability::EditPosts,
    Capability::PublishPosts,
    Capability::EditOthersPosts,
    Capability::ModerateComments,
    Capability::ManageCategories,
];
const AUTHOR_CAPABILITIES: &[Capability] = &[
    Capability::Read,
    Capability::EditPosts,
    Capability::PublishPosts,
];
const SUBSCRIBER_CAPABILITIES: &[Capability] = &[Capability::Read];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserRole {
    Administrator,
    Editor,
    Author,
    Subscriber,
}

impl UserRole {
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            UserRole::Administrator => ADMINISTRATOR_CAPABILITIES,
            UserRole::Editor => EDITOR_CAPABILITIES,
            UserRole::Author => AUTHOR_CAPABILITIES,
            UserRole::Subscriber => SUBSCRIBER_CAPABILITIES,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Administrator => "Administrator",
            UserRole::Editor => "Editor",
            UserRole::Author => "Author",
            UserRole::Subscriber => "Subscriber",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "administrator" | "admin" => Some(UserRole::Administrator),
            "editor" => Some(UserRole::Editor),
            "author" => Some(UserRole::Author),
            "subscriber" => Some(UserRole::Subscriber),
            _ => None,
        }
    }
}
