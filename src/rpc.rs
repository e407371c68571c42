//! Named remote procedures over the catalog.
//!
//! Transport-agnostic: a procedure name, a JSON input and a caller context
//! go in, a JSON output comes out. The HTTP binding lives in `server`.

use crate::auth::AuthService;
use crate::catalog::{CatalogService, LoginInput, SearchNovelsInput, Success, Validate};
use crate::db::User;
use crate::error::{AppError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;

/// Every procedure the router answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Procedure {
    Healthcheck,
    Login,
    Logout,
    Me,
    CreateUser,
    GetUsers,
    UpdateUser,
    DeleteUser,
    CreateAuthor,
    GetAuthors,
    UpdateAuthor,
    DeleteAuthor,
    CreateGenre,
    GetGenres,
    UpdateGenre,
    DeleteGenre,
    CreateNovel,
    GetNovelsList,
    GetFeaturedNovels,
    GetNovelById,
    SearchNovels,
    UpdateNovel,
    DeleteNovel,
    CreateChapter,
    GetChapters,
    GetChapterById,
    UpdateChapter,
    DeleteChapter,
    UpdateReadingProgress,
    GetUserReadingHistory,
    CreateAdPlacement,
    GetAdPlacements,
    GetActiveAdPlacements,
    UpdateAdPlacement,
    DeleteAdPlacement,
}

impl Procedure {
    /// All procedures, in listing order.
    pub const ALL: [Procedure; 35] = [
        Procedure::Healthcheck,
        Procedure::Login,
        Procedure::Logout,
        Procedure::Me,
        Procedure::CreateUser,
        Procedure::GetUsers,
        Procedure::UpdateUser,
        Procedure::DeleteUser,
        Procedure::CreateAuthor,
        Procedure::GetAuthors,
        Procedure::UpdateAuthor,
        Procedure::DeleteAuthor,
        Procedure::CreateGenre,
        Procedure::GetGenres,
        Procedure::UpdateGenre,
        Procedure::DeleteGenre,
        Procedure::CreateNovel,
        Procedure::GetNovelsList,
        Procedure::GetFeaturedNovels,
        Procedure::GetNovelById,
        Procedure::SearchNovels,
        Procedure::UpdateNovel,
        Procedure::DeleteNovel,
        Procedure::CreateChapter,
        Procedure::GetChapters,
        Procedure::GetChapterById,
        Procedure::UpdateChapter,
        Procedure::DeleteChapter,
        Procedure::UpdateReadingProgress,
        Procedure::GetUserReadingHistory,
        Procedure::CreateAdPlacement,
        Procedure::GetAdPlacements,
        Procedure::GetActiveAdPlacements,
        Procedure::UpdateAdPlacement,
        Procedure::DeleteAdPlacement,
    ];

    /// Wire name (camelCase).
    pub fn name(&self) -> &'static str {
        match self {
            Procedure::Healthcheck => "healthcheck",
            Procedure::Login => "login",
            Procedure::Logout => "logout",
            Procedure::Me => "me",
            Procedure::CreateUser => "createUser",
            Procedure::GetUsers => "getUsers",
            Procedure::UpdateUser => "updateUser",
            Procedure::DeleteUser => "deleteUser",
            Procedure::CreateAuthor => "createAuthor",
            Procedure::GetAuthors => "getAuthors",
            Procedure::UpdateAuthor => "updateAuthor",
            Procedure::DeleteAuthor => "deleteAuthor",
            Procedure::CreateGenre => "createGenre",
            Procedure::GetGenres => "getGenres",
            Procedure::UpdateGenre => "updateGenre",
            Procedure::DeleteGenre => "deleteGenre",
            Procedure::CreateNovel => "createNovel",
            Procedure::GetNovelsList => "getNovelsList",
            Procedure::GetFeaturedNovels => "getFeaturedNovels",
            Procedure::GetNovelById => "getNovelById",
            Procedure::SearchNovels => "searchNovels",
            Procedure::UpdateNovel => "updateNovel",
            Procedure::DeleteNovel => "deleteNovel",
            Procedure::CreateChapter => "createChapter",
            Procedure::GetChapters => "getChapters",
            Procedure::GetChapterById => "getChapterById",
            Procedure::UpdateChapter => "updateChapter",
            Procedure::DeleteChapter => "deleteChapter",
            Procedure::UpdateReadingProgress => "updateReadingProgress",
            Procedure::GetUserReadingHistory => "getUserReadingHistory",
            Procedure::CreateAdPlacement => "createAdPlacement",
            Procedure::GetAdPlacements => "getAdPlacements",
            Procedure::GetActiveAdPlacements => "getActiveAdPlacements",
            Procedure::UpdateAdPlacement => "updateAdPlacement",
            Procedure::DeleteAdPlacement => "deleteAdPlacement",
        }
    }

    /// Look up a procedure by wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Procedures that change state. These are never served over GET.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Procedure::Login
                | Procedure::Logout
                | Procedure::CreateUser
                | Procedure::UpdateUser
                | Procedure::DeleteUser
                | Procedure::CreateAuthor
                | Procedure::UpdateAuthor
                | Procedure::DeleteAuthor
                | Procedure::CreateGenre
                | Procedure::UpdateGenre
                | Procedure::DeleteGenre
                | Procedure::CreateNovel
                | Procedure::UpdateNovel
                | Procedure::DeleteNovel
                | Procedure::CreateChapter
                | Procedure::UpdateChapter
                | Procedure::DeleteChapter
                | Procedure::UpdateReadingProgress
                | Procedure::CreateAdPlacement
                | Procedure::UpdateAdPlacement
                | Procedure::DeleteAdPlacement
        )
    }

    /// Administrative procedures: catalog mutations plus the user and
    /// full ad listings.
    pub fn is_admin(&self) -> bool {
        match self {
            Procedure::Login | Procedure::Logout | Procedure::UpdateReadingProgress => false,
            Procedure::GetUsers | Procedure::GetAdPlacements => true,
            other => other.is_mutation(),
        }
    }
}

impl std::fmt::Display for Procedure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-request caller information.
#[derive(Debug, Clone, Default)]
pub struct RpcContext {
    /// Authenticated user, if a valid session token was presented.
    pub caller: Option<User>,
    /// The presented session token.
    pub token: Option<String>,
}

impl RpcContext {
    /// Context for a request without credentials.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Resolve an optional bearer token. A token that is presented but
    /// unknown or expired is rejected.
    pub fn from_token(auth: &AuthService, token: Option<String>) -> Result<Self> {
        let Some(token) = token else {
            return Ok(Self::anonymous());
        };

        let caller = auth
            .validate_token(&token)?
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(Self {
            caller: Some(caller),
            token: Some(token),
        })
    }

    /// Fail unless the caller is an administrator.
    pub fn require_admin(&self) -> Result<()> {
        match &self.caller {
            None => Err(AppError::Unauthorized("Login required".to_string())),
            Some(user) if !user.is_admin => Err(AppError::Forbidden(format!(
                "User {} is not an administrator",
                user.username
            ))),
            Some(_) => Ok(()),
        }
    }
}

#[derive(Serialize)]
struct LoginOutput {
    token: String,
    user: User,
}

/// Deserialize and check a procedure input.
fn parse_input<T: DeserializeOwned + Validate>(input: Value) -> Result<T> {
    let parsed: T = serde_json::from_value(input)
        .map_err(|e| AppError::Validation(format!("Invalid input: {}", e)))?;
    parsed.validate()?;
    Ok(parsed)
}

fn output<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| AppError::Internal(format!("Failed to serialize output: {}", e)))
}

/// Binds every [`Procedure`] to its handler.
#[derive(Clone)]
pub struct RpcRouter {
    catalog: CatalogService,
    auth: Arc<AuthService>,
    require_admin: bool,
}

impl RpcRouter {
    /// Create a router. With `require_admin`, administrative procedures
    /// need an admin session.
    pub fn new(catalog: CatalogService, auth: Arc<AuthService>, require_admin: bool) -> Self {
        Self {
            catalog,
            auth,
            require_admin,
        }
    }

    /// Session service used to resolve tokens.
    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    /// Run a procedure. `Value::Null` stands for "no input".
    pub fn dispatch(&self, ctx: &RpcContext, procedure: Procedure, input: Value) -> Result<Value> {
        if self.require_admin && procedure.is_admin() {
            ctx.require_admin()?;
        }

        tracing::debug!(%procedure, caller = ?ctx.caller.as_ref().map(|u| u.id), "Dispatching");

        let catalog = &self.catalog;
        match procedure {
            Procedure::Healthcheck => output(json!({
                "status": "ok",
                "timestamp": chrono::Utc::now().to_rfc3339(),
            })),
            Procedure::Login => {
                let input: LoginInput = parse_input(input)?;
                let (user, token) = self.auth.login(&input.identifier, &input.password)?;
                output(LoginOutput { token, user })
            }
            Procedure::Logout => {
                if let Some(token) = &ctx.token {
                    self.auth.logout(token)?;
                }
                output(Success::from(true))
            }
            Procedure::Me => output(&ctx.caller),

            Procedure::CreateUser => output(catalog.create_user(parse_input(input)?)?),
            Procedure::GetUsers => output(catalog.get_users()?),
            Procedure::UpdateUser => output(catalog.update_user(parse_input(input)?)?),
            Procedure::DeleteUser => output(catalog.delete_user(parse_input(input)?)?),

            Procedure::CreateAuthor => output(catalog.create_author(parse_input(input)?)?),
            Procedure::GetAuthors => output(catalog.get_authors()?),
            Procedure::UpdateAuthor => output(catalog.update_author(parse_input(input)?)?),
            Procedure::DeleteAuthor => output(catalog.delete_author(parse_input(input)?)?),

            Procedure::CreateGenre => output(catalog.create_genre(parse_input(input)?)?),
            Procedure::GetGenres => output(catalog.get_genres()?),
            Procedure::UpdateGenre => output(catalog.update_genre(parse_input(input)?)?),
            Procedure::DeleteGenre => output(catalog.delete_genre(parse_input(input)?)?),

            Procedure::CreateNovel => output(catalog.create_novel(parse_input(input)?)?),
            Procedure::GetNovelsList => output(catalog.get_novels_list()?),
            Procedure::GetFeaturedNovels => output(catalog.get_featured_novels()?),
            Procedure::GetNovelById => output(catalog.get_novel_by_id(parse_input(input)?)?),
            Procedure::SearchNovels => {
                // No input at all means "match everything"
                let input = if input.is_null() { json!({}) } else { input };
                output(catalog.search_novels(parse_input::<SearchNovelsInput>(input)?)?)
            }
            Procedure::UpdateNovel => output(catalog.update_novel(parse_input(input)?)?),
            Procedure::DeleteNovel => output(catalog.delete_novel(parse_input(input)?)?),

            Procedure::CreateChapter => output(catalog.create_chapter(parse_input(input)?)?),
            Procedure::GetChapters => output(catalog.get_chapters(parse_input(input)?)?),
            Procedure::GetChapterById => output(catalog.get_chapter_by_id(parse_input(input)?)?),
            Procedure::UpdateChapter => output(catalog.update_chapter(parse_input(input)?)?),
            Procedure::DeleteChapter => output(catalog.delete_chapter(parse_input(input)?)?),

            Procedure::UpdateReadingProgress => {
                output(catalog.update_reading_progress(parse_input(input)?)?)
            }
            Procedure::GetUserReadingHistory => {
                output(catalog.get_user_reading_history(parse_input(input)?)?)
            }

            Procedure::CreateAdPlacement => {
                output(catalog.create_ad_placement(parse_input(input)?)?)
            }
            Procedure::GetAdPlacements => output(catalog.get_ad_placements()?),
            Procedure::GetActiveAdPlacements => output(catalog.get_active_ad_placements()?),
            Procedure::UpdateAdPlacement => {
                output(catalog.update_ad_placement(parse_input(input)?)?)
            }
            Procedure::DeleteAdPlacement => {
                output(catalog.delete_ad_placement(parse_input(input)?)?)
            }
        }
    }
}
