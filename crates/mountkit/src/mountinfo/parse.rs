//! Parser for the `mountinfo` line format.
//!
//! See proc(5):
//!
//! ```text
//! 36 35 98:0 /mnt1 /mnt2 rw,noatime master:1 - ext3 /dev/root rw,errors=continue
//! (1)(2)(3)   (4)   (5)      (6)      (7)   (8) (9)   (10)         (11)
//! ```
//!
//! Six mandatory fields, zero or more optional fields, a `-` separator, then
//! three more mandatory fields.

use std::borrow::Cow;
use std::ffi::OsString;
use std::io::BufRead;
use std::os::unix::ffi::OsStringExt;
use std::path::PathBuf;

use mountkit_common::{MountError, MountResult, ParseErrorKind};

use super::{FilterDecision, MountFilter, MountInfo};

/// Minimum number of fields in a well-formed line.
const MIN_FIELDS: usize = 10;

/// The separator is never found at or before this index.
const LAST_MANDATORY_FIELD: usize = 5;

/// Parse mount table data, keeping the entries accepted by `filter`.
///
/// The filter runs once per fully parsed entry. Blank lines are ignored.
pub fn parse_mountinfo<R: BufRead>(
    reader: R,
    filter: Option<&dyn MountFilter>,
) -> MountResult<Vec<MountInfo>> {
    let mut out = Vec::new();

    for line in reader.split(b'\n') {
        let line = line?;
        if line.is_empty() {
            continue;
        }

        let info = parse_line(&line)?;
        let decision = filter.map_or(FilterDecision::KEEP, |f| f.decide(&info));
        if decision.skip {
            continue;
        }
        out.push(info);
        if decision.stop {
            break;
        }
    }

    Ok(out)
}

fn parse_line(line: &[u8]) -> MountResult<MountInfo> {
    let fields: Vec<&[u8]> = line.split(|&b| b == b' ').collect();
    let num_fields = fields.len();
    let fail = |kind| MountError::Parse {
        line: String::from_utf8_lossy(line).into_owned(),
        fields: num_fields,
        kind,
    };

    if num_fields < MIN_FIELDS {
        return Err(fail(ParseErrorKind::NotEnoughFields(num_fields)));
    }

    // Linux <= 3.9 could leave a space in the last field when a cifs share
    // name contained one ("unc=//srv/My Docs"), so search backwards.
    let mut sep = num_fields - 4;
    while fields[sep] != b"-" {
        sep -= 1;
        if sep == LAST_MANDATORY_FIELD {
            return Err(fail(ParseErrorKind::MissingSeparator));
        }
    }

    let device = fields[2];
    let Some(colon) = device.iter().position(|&b| b == b':') else {
        return Err(fail(ParseErrorKind::InvalidDevice(
            String::from_utf8_lossy(device).into_owned(),
        )));
    };

    Ok(MountInfo {
        id: to_int(fields[0]),
        parent: to_int(fields[1]),
        major: to_int(&device[..colon]),
        minor: to_int(&device[colon + 1..]),
        root: to_path(fields[3]),
        mountpoint: to_path(fields[4]),
        options: lossy(fields[5]),
        optional: join(&fields[6..sep]),
        fs_type: lossy(&unescape(fields[sep + 1])),
        source: lossy(&unescape(fields[sep + 2])),
        super_options: join(&fields[sep + 3..]),
    })
}

/// Decode `\NNN` octal escapes (`\040` space, `\011` tab, `\012` newline,
/// `\134` backslash, ...).
///
/// Fields without a backslash are returned as-is without copying. A sequence
/// that is not three octal digits, or whose value does not fit in a byte, is
/// kept verbatim.
#[must_use]
pub fn unescape(field: &[u8]) -> Cow<'_, [u8]> {
    if !field.contains(&b'\\') {
        return Cow::Borrowed(field);
    }

    let mut out = Vec::with_capacity(field.len());
    let mut i = 0;
    while i < field.len() {
        if field[i] == b'\\' {
            if let Some(byte) = field.get(i + 1..i + 4).and_then(octal_byte) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(field[i]);
        i += 1;
    }
    Cow::Owned(out)
}

fn octal_byte(digits: &[u8]) -> Option<u8> {
    let value = digits.iter().try_fold(0u16, |acc, &d| {
        matches!(d, b'0'..=b'7').then(|| acc * 8 + u16::from(d - b'0'))
    })?;
    u8::try_from(value).ok()
}

fn to_path(field: &[u8]) -> PathBuf {
    PathBuf::from(OsString::from_vec(unescape(field).into_owned()))
}

fn lossy(field: &[u8]) -> String {
    String::from_utf8_lossy(field).into_owned()
}

fn join(fields: &[&[u8]]) -> String {
    lossy(&fields.join(&b' '))
}

/// Numeric fields are always digits in practice; anything else reads as zero.
fn to_int(field: &[u8]) -> u32 {
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}
