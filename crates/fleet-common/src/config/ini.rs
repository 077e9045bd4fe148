use std::fs;
use std::path::{Path, PathBuf};

use figment::value::{Dict, Map, Tag, Value};
use figment::{Error, Metadata, Profile, Provider, Source};

/// A [`Provider`] for INI-style files, where every `[SECTION]` becomes
/// a dictionary of its `key = value` pairs.
///
/// Keys are lower-cased while section names are kept as written.
/// Values are parsed the same way as other [`figment`] sources, so numbers
/// become numbers and everything else stays a string.
/// Blank lines and lines starting with `#` or `;` are ignored.
pub struct IniFile {
    path: PathBuf,
    profile: Profile,
}

impl IniFile {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            profile: Profile::Default,
        }
    }
}

impl Provider for IniFile {
    fn metadata(&self) -> Metadata {
        Metadata::named("INI file").source(Source::File(self.path.clone()))
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            Error::from(format!("failed to read {}: {e}", self.path.display()))
        })?;
        let dict = parse_ini(&raw)
            .map_err(|e| Error::from(format!("{}: {e}", self.path.display())))?;
        let mut map = Map::new();
        map.insert(self.profile.clone(), dict);
        Ok(map)
    }

    fn profile(&self) -> Option<Profile> {
        Some(self.profile.clone())
    }
}

pub(crate) fn parse_ini(raw: &str) -> Result<Dict, String> {
    let mut dict = Dict::new();
    let mut section: Option<String> = None;
    for (number, line) in raw.lines().enumerate() {
        let number = number + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[') {
            let Some(name) = name.strip_suffix(']') else {
                return Err(format!("line {number}: unterminated section header"));
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(format!("line {number}: empty section name"));
            }
            dict.entry(name.to_string())
                .or_insert_with(|| Value::Dict(Tag::default(), Dict::new()));
            section = Some(name.to_string());
            continue;
        }
        let Some((key, value)) = line.split_once(['=', ':']) else {
            return Err(format!("line {number}: expected `key = value`"));
        };
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            return Err(format!("line {number}: empty key"));
        }
        let Some(name) = section.as_ref() else {
            return Err(format!("line {number}: key `{key}` is not in any section"));
        };
        let Some(Value::Dict(_, entries)) = dict.get_mut(name) else {
            return Err(format!("line {number}: invalid section `{name}`"));
        };
        if entries.contains_key(&key) {
            return Err(format!(
                "line {number}: duplicate key `{key}` in section `{name}`"
            ));
        }
        let value: Value = value.trim().parse().unwrap_or_else(|e| match e {});
        entries.insert(key, value);
    }
    Ok(dict)
}
