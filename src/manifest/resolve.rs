use super::scan::Scan;
use super::ManifestFile;
use crate::locate::{declarations, find_attribute};
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Variable name to literal value, as read from the variables file.
pub type Variables = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Identity {
    account_id: String,
    project: Option<String>,
}

impl Identity {
    fn attribute(&self, attribute: &str) -> Option<String> {
        match attribute {
            "account_id" => Some(self.account_id.clone()),
            "email" => self
                .project
                .as_ref()
                .map(|project| format!("{}@{project}.iam.gserviceaccount.com", self.account_id)),
            _ => None,
        }
    }
}

fn var_interpolation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{var\.([A-Za-z_][A-Za-z0-9_-]*)\}").expect("var interpolation regex")
    })
}

fn var_bare_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bvar\.([A-Za-z_][A-Za-z0-9_-]*)").expect("var regex"))
}

/// Build the matching view of `files`.
///
/// The first pass substitutes variable references. The second pass collects
/// the literal account ids of identity declarations across every file and
/// substitutes references to them, since member strings usually embed them.
/// Unknown references are left as written. Paths, order and line count are
/// preserved.
pub fn resolve_view(
    files: &[ManifestFile],
    variables: &Variables,
    identity_type: &str,
) -> Vec<ManifestFile> {
    let with_vars: Vec<ManifestFile> = files
        .iter()
        .map(|file| ManifestFile {
            path: file.path.clone(),
            contents: substitute(
                &file.contents,
                var_interpolation_regex(),
                var_bare_regex(),
                |caps| variables.get(&caps[1]).cloned(),
            ),
        })
        .collect();

    let identities = collect_identities(&with_vars, identity_type);
    if identities.is_empty() {
        return with_vars;
    }
    let type_pattern = regex::escape(identity_type);
    let (Ok(interpolation), Ok(bare)) = (
        Regex::new(&format!(
            r"\$\{{{type_pattern}\.([A-Za-z0-9_-]+)\.(account_id|email)\}}"
        )),
        Regex::new(&format!(
            r"\b{type_pattern}\.([A-Za-z0-9_-]+)\.(account_id|email)"
        )),
    ) else {
        return with_vars;
    };
    with_vars
        .into_iter()
        .map(|file| ManifestFile {
            contents: substitute(&file.contents, &interpolation, &bare, |caps| {
                identities
                    .get(&caps[1])
                    .and_then(|identity| identity.attribute(&caps[2]))
            }),
            path: file.path,
        })
        .collect()
}

fn collect_identities(files: &[ManifestFile], identity_type: &str) -> BTreeMap<String, Identity> {
    let mut identities = BTreeMap::new();
    for file in files {
        let scan = Scan::new(&file.contents);
        for decl in declarations(&scan, identity_type) {
            let Some(account_id) = find_attribute(&scan, &decl, "account_id")
                .and_then(|attr| attr.literal_value(&file.contents).map(str::to_string))
            else {
                continue;
            };
            if account_id.contains("${") {
                continue;
            }
            let project = find_attribute(&scan, &decl, "project")
                .and_then(|attr| attr.literal_value(&file.contents).map(str::to_string))
                .filter(|project| !project.contains("${"));
            identities
                .entry(decl.name)
                .or_insert(Identity {
                    account_id,
                    project,
                });
        }
    }
    identities
}

/// Replace `interpolation` matches anywhere and `bare` matches in code
/// position; bare references become quoted literals.
fn substitute<F>(text: &str, interpolation: &Regex, bare: &Regex, lookup: F) -> String
where
    F: Fn(&Captures<'_>) -> Option<String>,
{
    let interpolated = interpolation.replace_all(text, |caps: &Captures<'_>| {
        lookup(caps).unwrap_or_else(|| caps[0].to_string())
    });
    let scan = Scan::new(&interpolated);
    let bytes = interpolated.as_bytes();
    let mut out = String::with_capacity(interpolated.len());
    let mut last = 0;
    for caps in bare.captures_iter(&interpolated) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if !scan.is_code(whole.start()) {
            continue;
        }
        if whole.start() > 0 && is_reference_byte(bytes[whole.start() - 1]) {
            continue;
        }
        if matches!(bytes.get(whole.end()), Some(b'.' | b'[')) {
            continue;
        }
        let Some(value) = lookup(&caps) else {
            continue;
        };
        out.push_str(&interpolated[last..whole.start()]);
        out.push('"');
        out.push_str(&value);
        out.push('"');
        last = whole.end();
    }
    out.push_str(&interpolated[last..]);
    out
}

fn is_reference_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'.' | b'-')
}
