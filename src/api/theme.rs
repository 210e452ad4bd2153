//! Colour themes applied to the timetable grid.

// crates.io
use http::Method;
// self
use crate::{
	_prelude::*,
	api::{self, Version},
	client::AuthClient,
	http::HttpTransport,
};

/// Colours used for one subject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorScheme {
	/// Subject the scheme applies to.
	pub subject: String,
	/// Background colour (CSS colour string).
	pub color: String,
	/// Foreground colour (CSS colour string).
	pub text_color: String,
}

/// A user-owned theme.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Theme {
	/// Theme identifier (ULID).
	pub theme_id: String,
	/// Display title.
	pub title: String,
	/// Whether other users can see the theme.
	#[serde(default)]
	pub published: bool,
	/// Whether this is the user's active theme.
	#[serde(default)]
	pub selected: bool,
	/// Per-subject colours.
	#[serde(default)]
	pub color_schemes: Vec<ColorScheme>,
	/// Creation time.
	#[serde(default, deserialize_with = "api::lenient_timestamp")]
	pub created_at: Option<OffsetDateTime>,
	/// Last modification time.
	#[serde(default, deserialize_with = "api::lenient_timestamp")]
	pub updated_at: Option<OffsetDateTime>,
}
impl Theme {
	/// Returns the colours for `subject`, if the theme defines any.
	pub fn scheme_for(&self, subject: &str) -> Option<&ColorScheme> {
		self.color_schemes.iter().find(|scheme| scheme.subject == subject)
	}
}

/// Partial update for [`AuthClient::update_theme`]; `None` fields are left unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ThemeUpdate {
	/// New title.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	/// Replacement colour schemes.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub color_schemes: Option<Vec<ColorScheme>>,
}
impl ThemeUpdate {
	/// Sets the new title.
	pub fn title(mut self, title: impl Into<String>) -> Self {
		self.title = Some(title.into());

		self
	}

	/// Sets the replacement colour schemes.
	pub fn color_schemes(mut self, schemes: Vec<ColorScheme>) -> Self {
		self.color_schemes = Some(schemes);

		self
	}
}

#[derive(Serialize)]
struct CreateTheme<'a> {
	title: &'a str,
}

#[derive(Serialize)]
struct SelectTheme<'a> {
	theme_id: &'a str,
}

impl<T> AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Fetches the theme data version (`GET /theme/status`).
	pub async fn fetch_theme_status(&self) -> Result<Version> {
		self.fetch_version("/theme/status").await
	}

	/// Lists the user's themes (`GET /theme/`).
	pub async fn fetch_themes(&self) -> Result<Vec<Theme>> {
		self.fetch_data("/theme/").await
	}

	/// Fetches one theme (`GET /theme/{id}`).
	pub async fn fetch_theme(&self, theme_id: &str) -> Result<Theme> {
		self.fetch_data(&theme_path(theme_id)).await
	}

	/// Fetches the active theme (`GET /theme/selected`).
	pub async fn fetch_selected_theme(&self) -> Result<Theme> {
		self.fetch_data("/theme/selected").await
	}

	/// Creates a theme with default colours (`POST /theme/`).
	pub async fn create_theme(&self, title: &str) -> Result<Theme> {
		self.send_data(Method::POST, "/theme/", &CreateTheme { title }).await
	}

	/// Applies a partial update (`PUT /theme/{id}`).
	pub async fn update_theme(&self, theme_id: &str, update: &ThemeUpdate) -> Result<()> {
		self.send_unit(Method::PUT, &theme_path(theme_id), update).await
	}

	/// Makes `theme_id` the active theme (`PUT /theme/selected`).
	pub async fn select_theme(&self, theme_id: &str) -> Result<()> {
		self.send_unit(Method::PUT, "/theme/selected", &SelectTheme { theme_id }).await
	}

	/// Deletes a theme (`DELETE /theme/{id}`).
	pub async fn delete_theme(&self, theme_id: &str) -> Result<()> {
		api::ensure_success(&self.delete(&theme_path(theme_id)).await?)
	}
}

fn theme_path(theme_id: &str) -> String {
	format!("/theme/{}", api::path_segment(theme_id))
}
