use std::{ffi::OsStr, path::Path};

use axum::{
    extract::{Multipart, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Response},
};
use tic_core::{converter, ical::generator::Emitter};
use uuid::Uuid;

use crate::AppState;

/// Handle timetable uploads.
///
/// The multipart body must contain a `file` field carrying a `.csv`-named
/// file. The generated calendar is returned as a download named after the
/// upload, with the extension replaced by `.ics`.
pub async fn handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, (StatusCode, String)> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = sanitize_file_name(field.file_name().unwrap_or_default());
        let data = field.bytes().await.map_err(bad_request)?;
        upload = Some((file_name, data));
        break;
    }
    let Some((file_name, data)) = upload else {
        return Err((
            StatusCode::BAD_REQUEST,
            "the multipart body must contain a `file` field".to_string(),
        ));
    };
    if !is_csv_file_name(&file_name) {
        return Err((
            StatusCode::BAD_REQUEST,
            "invalid file format, please upload a CSV file".to_string(),
        ));
    }
    // Every upload gets its own directory, concurrent requests never collide.
    let request_dir = state.upload_dir.join(Uuid::new_v4().to_string());
    let ics_file_name = ics_file_name(&file_name);
    stage(&request_dir, &file_name, &data).await?;
    let calendar = converter::convert(data.as_ref()).map_err(|err| {
        log::error!("conversion of `{file_name}` failed: {err}");
        (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    })?;
    let generated = calendar.generate();
    stage(&request_dir, &ics_file_name, generated.as_bytes()).await?;
    log::info!("converted `{file_name}` to `{ics_file_name}`");
    let response = (
        [
            (CONTENT_TYPE, "text/calendar".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{ics_file_name}\""),
            ),
        ],
        generated,
    )
        .into_response();
    Ok(response)
}

/// Write one staged file below the per-request directory.
async fn stage(
    request_dir: &Path,
    file_name: &str,
    data: &[u8],
) -> Result<(), (StatusCode, String)> {
    tokio::fs::create_dir_all(request_dir)
        .await
        .map_err(internal_error)?;
    tokio::fs::write(request_dir.join(file_name), data)
        .await
        .map_err(internal_error)?;
    Ok(())
}

fn bad_request(err: impl ToString) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, err.to_string())
}

fn internal_error(err: std::io::Error) -> (StatusCode, String) {
    log::error!("staging an upload failed: {err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "cannot stage the uploaded file".to_string(),
    )
}

/// Reduce an uploaded file name to its final path component.
fn sanitize_file_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or_default()
        .to_string()
}

fn is_csv_file_name(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("csv"))
}

/// Get the download name for the calendar generated from an upload.
fn ics_file_name(csv_file_name: &str) -> String {
    let stem = Path::new(csv_file_name)
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("calendar");
    format!("{stem}.ics")
}

#[cfg(test)]
mod tests {
    use crate::route::upload::{ics_file_name, is_csv_file_name, sanitize_file_name};

    #[test]
    fn test_is_csv_file_name() {
        assert!(is_csv_file_name("timetable.csv"));
        assert!(is_csv_file_name("Timetable.CSV"));
        assert!(!is_csv_file_name("timetable.xlsx"));
        assert!(!is_csv_file_name("timetable"));
        assert!(!is_csv_file_name(""));
    }

    #[test]
    fn test_ics_file_name() {
        assert_eq!(ics_file_name("timetable.csv"), "timetable.ics");
        assert_eq!(ics_file_name("interview.prep.csv"), "interview.prep.ics");
        assert_eq!(ics_file_name(""), "calendar.ics");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("timetable.csv"), "timetable.csv");
        assert_eq!(sanitize_file_name("../../etc/timetable.csv"), "timetable.csv");
        assert_eq!(sanitize_file_name("/tmp/timetable.csv"), "timetable.csv");
    }
}
