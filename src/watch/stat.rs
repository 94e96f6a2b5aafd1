use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::utils::time::now_millis;

const S_IFMT: u32 = 0o170000;
const S_IFREG: u32 = 0o100000;
const S_IFDIR: u32 = 0o040000;
const S_IFLNK: u32 = 0o120000;

/// Stat-shaped snapshot carried by `"watch_"` feed payloads.
///
/// Field names follow the engine's camelCase wire shape. A snapshot the
/// engine leaves out, or any field it leaves out or sends as `null`, reads
/// as zero, except the four timestamps which read as the current time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatSnapshot {
    pub dev: f64,
    pub ino: f64,
    pub mode: u32,
    pub nlink: i64,
    pub uid: i64,
    pub gid: i64,
    pub rdev: u64,
    pub size: u64,
    pub blksize: u64,
    pub blocks: u64,
    pub atime_ms: f64,
    pub mtime_ms: f64,
    pub ctime_ms: f64,
    pub birthtime_ms: f64,
}

impl StatSnapshot {
    pub fn zeroed() -> Self {
        let now = now_millis();
        Self {
            dev: 0.0,
            ino: 0.0,
            mode: 0,
            nlink: 0,
            uid: 0,
            gid: 0,
            rdev: 0,
            size: 0,
            blksize: 0,
            blocks: 0,
            atime_ms: now,
            mtime_ms: now,
            ctime_ms: now,
            birthtime_ms: now,
        }
    }

    /// Overlays the non-null fields of `partial` on [`zeroed`](Self::zeroed).
    ///
    /// Fields are merged one at a time: an unknown key, or a value that does
    /// not fit its field's type, is skipped and the rest still apply.
    pub fn fill(partial: Option<&Value>) -> Self {
        let base = Self::zeroed();
        let Some(Value::Object(fields)) = partial else {
            return base;
        };
        let Ok(Value::Object(mut merged)) = serde_json::to_value(&base) else {
            return base;
        };
        for (key, value) in fields {
            if value.is_null() {
                continue;
            }
            overlay_field(&mut merged, key, value);
        }
        serde_json::from_value(Value::Object(merged)).unwrap_or(base)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn is_file(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    pub fn is_directory(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_symbolic_link(&self) -> bool {
        self.mode & S_IFMT == S_IFLNK
    }
}

fn overlay_field(
    merged: &mut Map<String, Value>,
    key: &str,
    value: &Value,
) {
    let Some(previous) = merged.insert(key.to_string(), value.clone()) else {
        merged.remove(key);
        return;
    };
    if serde_json::from_value::<StatSnapshot>(Value::Object(merged.clone())).is_err() {
        merged.insert(key.to_string(), previous);
    }
}
