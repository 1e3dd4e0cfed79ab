use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::GupError,
    service::AppState,
    types::{CheckParams, PublishForm},
    xml,
};

/// `GET /params?version=<v>`: tells the client whether to update.
#[instrument(skip(state), fields(version = ?params.version))]
pub async fn check_version_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CheckParams>,
) -> Response {
    let Some(client_version) = params.version else {
        return GupError::MissingField("version".to_string()).into_response();
    };

    let document = match state.check_version(&client_version).await {
        Ok(response) => xml::render(&response),
        Err(e) => Err(e),
    };

    match document {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!("Version check failed: {}", e);
            e.into_response()
        }
    }
}

/// `GET /setup`: streams the installer of the published version.
#[instrument(skip(state))]
pub async fn fetch_installer_handler(State(state): State<Arc<AppState>>) -> Response {
    let (path, file_name) = match state.current_installer().await {
        Ok(installer) => installer,
        Err(e) => {
            warn!("Installer download failed: {}", e);
            return e.into_response();
        }
    };

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) => {
            warn!("Failed to open installer {}: {}", path.display(), e);
            return GupError::InstallerNotFound(path.display().to_string()).into_response();
        }
    };

    debug!("Streaming installer {}", path.display());
    let body = Body::from_stream(ReaderStream::new(file));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
        .into_response()
}

/// `POST /update`: publishes a new current version from a multipart form.
#[instrument(skip_all)]
pub async fn publish_update_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<StatusCode, GupError> {
    let form = read_publish_form(&state, multipart).await?;
    let record = state.publish(form).await?;

    info!(
        "Published version {} (force update: {})",
        record.version, record.force_update
    );
    Ok(StatusCode::OK)
}

async fn read_publish_form(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<PublishForm, GupError> {
    let mut form = PublishForm::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| GupError::Multipart(e.to_string()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == state.config.version_field {
            let text = field
                .text()
                .await
                .map_err(|e| GupError::Multipart(e.to_string()))?;
            debug!("Part: {}={}", name, text);
            form.version = Some(text);
        } else if name == state.config.force_field {
            let text = field
                .text()
                .await
                .map_err(|e| GupError::Multipart(e.to_string()))?;
            debug!("Part: {}={}", name, text);
            form.force_update = Some(text);
        } else if name == state.config.installer_field {
            let mut pending = state.store.begin_artifact()?;
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| GupError::Multipart(e.to_string()))?
            {
                pending.write_chunk(&chunk).await?;
            }
            debug!("Part: {} ({} bytes)", name, pending.size());
            if pending.size() > 0 {
                form.installer = Some(pending);
            }
        } else {
            debug!("Ignoring unknown part: {}", name);
        }
    }

    Ok(form)
}

pub async fn health_handler() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::Request,
    };
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::config::GupConfig;

    const BOUNDARY: &str = "gup-test-boundary";

    fn test_app(dir: &TempDir) -> (Router, Arc<AppState>) {
        let config = GupConfig {
            data_dir: dir.path().to_path_buf(),
            download_url: "http://updates.example.com/setup".to_string(),
            ..GupConfig::default()
        };
        let state = Arc::new(AppState::new(config).unwrap());
        (crate::create_router(state.clone()), state)
    }

    fn installer_path(dir: &TempDir, version: &str) -> std::path::PathBuf {
        dir.path()
            .join(format!("StageInstrument-{version}-x64-Setup.msi"))
    }

    async fn publish_record(dir: &TempDir, version: &str, force: &str) {
        tokio::fs::write(installer_path(dir, version), b"installer bytes")
            .await
            .unwrap();
        tokio::fs::write(
            dir.path().join("localVersion.txt"),
            format!("{version}\n{force}\n"),
        )
        .await
        .unwrap();
    }

    fn multipart_body(fields: &[(&str, &str)]) -> Body {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            if *name == "Installer" {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"setup.msi\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
            } else {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    fn publish_request(fields: &[(&str, &str)]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/update")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart_body(fields))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn check_reports_available_update() {
        let dir = TempDir::new().unwrap();
        publish_record(&dir, "2.0.0", "no").await;
        let (app, _) = test_app(&dir);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/params?version=1.0.0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/xml; charset=utf-8"
        );
        let body = body_text(response).await;
        assert!(body.contains("<NeedToBeUpdated>yes</NeedToBeUpdated>"));
        assert!(body.contains("<NeedToBeForceUpdated>no</NeedToBeForceUpdated>"));
        assert!(body.contains("<Version>2.0.0</Version>"));
        assert!(body.contains("<Location>http://updates.example.com/setup</Location>"));
    }

    #[tokio::test]
    async fn check_never_forces_when_up_to_date() {
        let dir = TempDir::new().unwrap();
        publish_record(&dir, "1.0.0", "yes").await;
        let (app, _) = test_app(&dir);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/params?version=1.0.0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("<NeedToBeUpdated>no</NeedToBeUpdated>"));
        assert!(body.contains("<NeedToBeForceUpdated>no</NeedToBeForceUpdated>"));
    }

    #[tokio::test]
    async fn check_rejects_malformed_version_without_side_effects() {
        let dir = TempDir::new().unwrap();
        publish_record(&dir, "2.0.0", "yes").await;
        let (app, _) = test_app(&dir);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/params?version=not-a-version")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let record = tokio::fs::read_to_string(dir.path().join("localVersion.txt"))
            .await
            .unwrap();
        assert_eq!(record, "2.0.0\nyes\n");
    }

    #[tokio::test]
    async fn check_rejects_missing_version_parameter() {
        let dir = TempDir::new().unwrap();
        publish_record(&dir, "2.0.0", "no").await;
        let (app, _) = test_app(&dir);

        let response = app
            .oneshot(Request::builder().uri("/params").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn check_fails_when_record_is_invalid() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("localVersion.txt"), "-1\nno\n")
            .await
            .unwrap();
        let (app, _) = test_app(&dir);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/params?version=1.0.0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn setup_streams_current_installer() {
        let dir = TempDir::new().unwrap();
        publish_record(&dir, "2.0.0", "no").await;
        let (app, _) = test_app(&dir);

        let response = app
            .oneshot(Request::builder().uri("/setup").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"StageInstrument-2.0.0-x64-Setup.msi\""
        );
        assert_eq!(body_text(response).await, "installer bytes");
    }

    #[tokio::test]
    async fn setup_reports_missing_installer() {
        let dir = TempDir::new().unwrap();
        publish_record(&dir, "2.0.0", "no").await;
        tokio::fs::remove_file(installer_path(&dir, "2.0.0"))
            .await
            .unwrap();
        let (app, _) = test_app(&dir);

        let response = app
            .oneshot(Request::builder().uri("/setup").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn publish_records_version_with_existing_installer() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(installer_path(&dir, "3.0.0"), b"msi")
            .await
            .unwrap();
        let (app, state) = test_app(&dir);

        let response = app
            .oneshot(publish_request(&[
                ("Version", "3.0.0"),
                ("ForceUpdate", "yes"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let record = state.store.load().await.unwrap();
        assert_eq!(record.version.as_str(), "3.0.0");
        assert!(record.force_update.is_forced());
    }

    #[tokio::test]
    async fn publish_rejects_version_without_installer() {
        let dir = TempDir::new().unwrap();
        publish_record(&dir, "2.0.0", "no").await;
        let (app, state) = test_app(&dir);

        let response = app
            .oneshot(publish_request(&[
                ("Version", "3.0.0"),
                ("ForceUpdate", "yes"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.store.load().await.unwrap().version.as_str(), "2.0.0");
    }

    #[tokio::test]
    async fn publish_rejects_invalid_fields() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(installer_path(&dir, "3.0.0"), b"msi")
            .await
            .unwrap();
        let (app, _) = test_app(&dir);

        let cases: [&[(&str, &str)]; 3] = [
            &[("Version", "3.0"), ("ForceUpdate", "no")],
            &[("Version", "3.0.0"), ("ForceUpdate", "sometimes")],
            &[("ForceUpdate", "no")],
        ];

        for fields in cases {
            let response = app.clone().oneshot(publish_request(fields)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
        assert!(!dir.path().join("localVersion.txt").exists());
    }

    #[tokio::test]
    async fn publish_defaults_force_flag_to_no() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(installer_path(&dir, "3.0.0"), b"msi")
            .await
            .unwrap();
        let (app, state) = test_app(&dir);

        let response = app
            .oneshot(publish_request(&[("Version", "3.0.0")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!state.store.load().await.unwrap().force_update.is_forced());
    }

    #[tokio::test]
    async fn publish_accepts_uploaded_installer() {
        let dir = TempDir::new().unwrap();
        let (app, state) = test_app(&dir);

        let response = app
            .clone()
            .oneshot(publish_request(&[
                ("Version", "4.1.0"),
                ("ForceUpdate", "no"),
                ("Installer", "uploaded installer"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.store.load().await.unwrap().version.as_str(), "4.1.0");

        let response = app
            .oneshot(Request::builder().uri("/setup").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "uploaded installer");
    }

    #[tokio::test]
    async fn publish_rejects_version_with_surrounding_whitespace() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(installer_path(&dir, "3.0.0"), b"msi")
            .await
            .unwrap();
        let (app, _) = test_app(&dir);

        let cases: [&[(&str, &str)]; 3] = [
            &[("Version", " 3.0.0"), ("ForceUpdate", "no")],
            &[("Version", "3.0.0\t"), ("ForceUpdate", "no")],
            &[("Version", "3.0.0"), ("ForceUpdate", " yes")],
        ];

        for fields in cases {
            let response = app.clone().oneshot(publish_request(fields)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
        assert!(!dir.path().join("localVersion.txt").exists());
    }

    #[tokio::test]
    async fn publish_streams_large_installer_to_disk() {
        let dir = TempDir::new().unwrap();
        let (app, state) = test_app(&dir);
        let installer: String = (0..200_000)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect();

        let response = app
            .clone()
            .oneshot(publish_request(&[
                ("Installer", installer.as_str()),
                ("Version", "5.0.0"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.store.load().await.unwrap().version.as_str(), "5.0.0");

        let response = app
            .oneshot(Request::builder().uri("/setup").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_text(response).await, installer);

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().into_owned();
            assert!(!name.ends_with(".tmp"), "leftover temp file {name}");
        }
    }

    #[tokio::test]
    async fn publish_discards_upload_when_version_is_invalid() {
        let dir = TempDir::new().unwrap();
        let (app, _) = test_app(&dir);

        let response = app
            .oneshot(publish_request(&[
                ("Installer", "uploaded installer"),
                ("Version", "5.0"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn health_is_ok() {
        let dir = TempDir::new().unwrap();
        let (app, _) = test_app(&dir);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
