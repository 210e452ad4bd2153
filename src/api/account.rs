//! Account records and the account endpoints.

// self
use crate::{
	_prelude::*,
	api,
	client::AuthClient,
	http::HttpTransport,
};

/// A role code the client does not know.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown role code {0}.")]
pub struct UnknownRole(pub u8);

/// Account role. Codes are bit values so the backend can compare privilege levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Role {
	/// Enrolled student.
	Student = 1,
	/// Teaching staff.
	Teacher = 2,
	/// School manager; may list identify tokens.
	Manager = 4,
	/// Full administrator.
	Administrator = 8,
}
impl Role {
	/// Returns `true` for roles at or above [`Role::Manager`].
	pub fn is_staff_manager(self) -> bool {
		self >= Self::Manager
	}
}
impl TryFrom<u8> for Role {
	type Error = UnknownRole;

	fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
		match code {
			1 => Ok(Self::Student),
			2 => Ok(Self::Teacher),
			4 => Ok(Self::Manager),
			8 => Ok(Self::Administrator),
			other => Err(UnknownRole(other)),
		}
	}
}
impl From<Role> for u8 {
	fn from(role: Role) -> Self {
		role as u8
	}
}

/// School record linked to an account.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
	/// Record identifier.
	pub user_info_id: String,
	/// Real name.
	pub name: String,
	/// Enrolment year group.
	#[serde(default)]
	pub generation: Option<u32>,
	/// Homeroom class number.
	#[serde(default)]
	pub clazz: Option<u32>,
	/// Student number within the class.
	#[serde(default)]
	pub number: Option<u32>,
	/// Accumulated credits.
	#[serde(default)]
	pub credit: Option<u32>,
	/// Role of the account.
	pub role: Role,
}

/// A user account.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Account {
	/// Account identifier (ULID).
	pub user_id: String,
	/// Contact email.
	pub email: String,
	/// Login name.
	pub username: String,
	/// Linked school record.
	pub user_info: UserInfo,
}
impl Account {
	/// Shorthand for the linked record's role.
	pub fn role(&self) -> Role {
		self.user_info.role
	}
}

impl<T> AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Fetches the signed-in account (`GET /account/`).
	pub async fn fetch_current_account(&self) -> Result<Account> {
		self.fetch_data("/account/").await
	}

	/// Fetches another account by id (`GET /account/{id}`).
	pub async fn fetch_account(&self, user_id: &str) -> Result<Account> {
		self.fetch_data(&format!("/account/{}", api::path_segment(user_id))).await
	}

	/// Deletes the signed-in account (`DELETE /account/`) and forgets its credentials.
	pub async fn delete_account(&self) -> Result<()> {
		api::ensure_success(&self.delete("/account/").await?)?;

		self.logout().await
	}
}
