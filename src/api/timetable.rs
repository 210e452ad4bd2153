//! Personal timetable and its day/period schedule grid.

// std
use std::collections::BTreeMap;
// crates.io
use serde::de::Error as _;
// self
use crate::{_prelude::*, api::Version, client::AuthClient, http::HttpTransport};

/// Day of the week as labelled by the backend (`Sun`..`Sat`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Day {
	/// Sunday.
	Sun,
	/// Monday.
	Mon,
	/// Tuesday.
	Tue,
	/// Wednesday.
	Wed,
	/// Thursday.
	Thu,
	/// Friday.
	Fri,
	/// Saturday.
	Sat,
}
impl Day {
	/// All days, Sunday first, matching the backend's day indices.
	pub const ALL: [Self; 7] =
		[Self::Sun, Self::Mon, Self::Tue, Self::Wed, Self::Thu, Self::Fri, Self::Sat];

	/// Returns the day for a backend index (`0` = Sunday).
	pub fn from_index(index: u8) -> Option<Self> {
		Self::ALL.get(usize::from(index)).copied()
	}

	/// Returns the backend label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Sun => "Sun",
			Self::Mon => "Mon",
			Self::Tue => "Tue",
			Self::Wed => "Wed",
			Self::Thu => "Thu",
			Self::Fri => "Fri",
			Self::Sat => "Sat",
		}
	}
}
impl Display for Day {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl<'de> Deserialize<'de> for Day {
	fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		match DayRepr::deserialize(deserializer)? {
			DayRepr::Index(index) => Self::from_index(index).ok_or_else(|| {
				D::Error::custom(format!("day index {index} is out of range"))
			}),
			DayRepr::Label(label) => Self::ALL
				.into_iter()
				.find(|day| day.as_str().eq_ignore_ascii_case(&label))
				.ok_or_else(|| D::Error::custom(format!("unknown day `{label}`"))),
		}
	}
}

// Older deployments send the raw day index instead of the label.
#[derive(Deserialize)]
#[serde(untagged)]
enum DayRepr {
	Index(u8),
	Label(String),
}

/// One scheduled slot of a class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
	/// 1-based period number within the day.
	pub period: u8,
	/// Day the period falls on.
	pub day: Day,
}

/// A class the user attends or teaches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
	/// Subject name.
	pub subject: String,
	/// Teacher name.
	pub teacher: String,
	/// Division (section) number of the lecture.
	pub division: u32,
	/// Classroom, when assigned.
	#[serde(default)]
	pub room: Option<String>,
	/// Periods the class occupies, in backend order.
	#[serde(default)]
	pub periods: Vec<Period>,
}

/// A run of consecutive periods of one class on one day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScheduleBlock {
	/// Day of the run.
	pub day: Day,
	/// First period, inclusive.
	pub period_from: u8,
	/// Last period, inclusive.
	pub period_to: u8,
	/// Index of the class in [`Timetable::classes`].
	pub class_index: usize,
}
impl ScheduleBlock {
	/// Number of periods covered.
	pub fn period_count(&self) -> u8 {
		self.period_to - self.period_from + 1
	}

	/// Returns `true` when `period` falls inside the block.
	pub fn contains(&self, period: u8) -> bool {
		(self.period_from..=self.period_to).contains(&period)
	}
}

/// Timetable of the signed-in user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timetable {
	/// Username, when the backend includes it.
	pub username: Option<String>,
	/// Display name of the user.
	pub name: String,
	/// Classes in backend order.
	pub classes: Vec<ClassEntry>,
	/// Schedule grid derived from [`Self::classes`].
	pub schedules: Vec<ScheduleBlock>,
}
impl Timetable {
	/// Builds a timetable and derives its schedule grid.
	pub fn new(username: Option<String>, name: impl Into<String>, classes: Vec<ClassEntry>) -> Self {
		let schedules = group_schedules(&classes);

		Self { username, name: name.into(), classes, schedules }
	}

	/// Returns the class a block belongs to.
	pub fn class_of(&self, block: &ScheduleBlock) -> Option<&ClassEntry> {
		self.classes.get(block.class_index)
	}

	/// Returns the blocks scheduled on `day`, ordered by starting period.
	pub fn blocks_on(&self, day: Day) -> Vec<&ScheduleBlock> {
		let mut blocks: Vec<_> = self.schedules.iter().filter(|block| block.day == day).collect();

		blocks.sort_by_key(|block| block.period_from);

		blocks
	}
}
impl<'de> Deserialize<'de> for Timetable {
	fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		#[derive(Deserialize)]
		struct Wire {
			#[serde(default)]
			username: Option<String>,
			name: String,
			timetable: Vec<ClassEntry>,
		}

		let wire = Wire::deserialize(deserializer)?;

		Ok(Self::new(wire.username, wire.name, wire.timetable))
	}
}

/// Groups every class's periods into per-day runs of consecutive periods.
///
/// Days keep the order in which they first appear for the class. Within a day, periods are
/// sorted and deduplicated before runs are formed, so `[3, 1, 2, 2, 5]` yields `1..=3` and
/// `5..=5`.
pub fn group_schedules(classes: &[ClassEntry]) -> Vec<ScheduleBlock> {
	let mut blocks = Vec::new();

	for (class_index, class) in classes.iter().enumerate() {
		let mut day_order = Vec::new();
		let mut by_day = BTreeMap::<Day, Vec<u8>>::new();

		for period in &class.periods {
			if !by_day.contains_key(&period.day) {
				day_order.push(period.day);
			}

			by_day.entry(period.day).or_default().push(period.period);
		}

		for day in day_order {
			let Some(mut periods) = by_day.remove(&day) else { continue };

			periods.sort_unstable();
			periods.dedup();

			for (period_from, period_to) in contiguous_runs(&periods) {
				blocks.push(ScheduleBlock { day, period_from, period_to, class_index });
			}
		}
	}

	blocks
}

fn contiguous_runs(sorted: &[u8]) -> Vec<(u8, u8)> {
	let mut runs: Vec<(u8, u8)> = Vec::new();

	for &period in sorted {
		match runs.last_mut() {
			Some((_, end)) if end.checked_add(1) == Some(period) => *end = period,
			_ => runs.push((period, period)),
		}
	}

	runs
}

impl<T> AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Fetches the signed-in user's timetable (`GET /timetable`).
	pub async fn fetch_timetable(&self) -> Result<Timetable> {
		self.fetch_data("/timetable").await
	}

	/// Fetches the timetable data version (`GET /timetable/status`).
	pub async fn fetch_timetable_status(&self) -> Result<Version> {
		self.fetch_version("/timetable/status").await
	}
}
