use crate::core::normalize::normalize_accounts;
use crate::domain::model::{Account, ImportEntry};
use crate::utils::error::{FedilistError, Result};

/// Column order matches the CSV export format used by Mastodon itself, so
/// exports from one tool import cleanly into the other.
pub const CSV_HEADER: [&str; 9] = [
    "Account address",
    "Show boosts",
    "Notify on new posts",
    "Languages",
    "Display name",
    "Bio",
    "Local URL",
    "URL",
    "Avatar URL",
];

const ADDRESS_COLUMN: &str = "Account address";
const BOOSTS_COLUMN: &str = "Show boosts";
const NOTIFY_COLUMN: &str = "Notify on new posts";

/// Renders accounts as CSV. Accounts are normalized first so the address is
/// always fully qualified and `local_url` is populated when a viewer is
/// known. Bios are flattened to a single line.
pub fn accounts_to_csv(accounts: Vec<Account>, viewer: Option<&Account>) -> Result<String> {
    let accounts = normalize_accounts(accounts, viewer)?;
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for account in &accounts {
        let bio = account.note.replace('\n', " ");
        writer.write_record([
            account.acct.as_str(),
            "true",
            "false",
            "",
            account.display_name.as_str(),
            bio.as_str(),
            account.local_url.as_deref().unwrap_or(""),
            account.url.as_str(),
            account.avatar.as_str(),
        ])?;
    }
    writer.flush()?;
    let bytes = writer
        .into_inner()
        .map_err(|e| FedilistError::IoError(std::io::Error::other(e.to_string())))?;
    String::from_utf8(bytes).map_err(|e| {
        FedilistError::IoError(std::io::Error::other(format!("CSV output was not UTF-8: {e}")))
    })
}

/// Parses import rows independently of one another: a row without an account
/// address yields an error for that row only, never for the whole file.
///
/// `Show boosts` defaults to true unless the column reads `false`; `Notify on
/// new posts` defaults to false unless it reads `true`. Both are
/// case-insensitive, and each flag is read on its own merits regardless of
/// whether the other column is present.
pub fn parse_import_rows(csv_text: &str) -> Result<Vec<Result<ImportEntry>>> {
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
    let headers = reader.headers()?.clone();
    let address_column = headers.iter().position(|h| h == ADDRESS_COLUMN);
    let boosts_column = headers.iter().position(|h| h == BOOSTS_COLUMN);
    let notify_column = headers.iter().position(|h| h == NOTIFY_COLUMN);

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                entries.push(Err(e.into()));
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let address = address_column
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|address| !address.is_empty());
        let Some(address) = address else {
            entries.push(Err(FedilistError::MissingAddress { line }));
            continue;
        };
        let boosts = boosts_column
            .and_then(|i| record.get(i))
            .map(|value| !value.trim().eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        let notify = notify_column
            .and_then(|i| record.get(i))
            .map(|value| value.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        entries.push(Ok(ImportEntry {
            address: address.to_string(),
            boosts,
            notify,
        }));
    }
    Ok(entries)
}
