use crate::common::{TEST_CHUNK_SIZE, TestApp, UploadForm, patterned_bytes, routes};

const VIDEO_LEN: usize = 5000;

/// Upload a patterned video and return `(video id, stream path)`.
async fn uploaded(app: &TestApp) -> (i64, String) {
    let token = app.admin_token().await;
    let res = app
        .upload(UploadForm::with_file("Streamable", VIDEO_LEN), &token)
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
    let path = res.body["data"]["videoUrl"].as_str().unwrap().to_string();
    (res.id(), path)
}

mod full_content {
    use super::*;

    #[tokio::test]
    async fn stream_serves_the_whole_file_inline() {
        let app = TestApp::spawn().await;
        let (_, path) = uploaded(&app).await;

        let res = app.get_without_token(&path).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.bytes, patterned_bytes(VIDEO_LEN));
        assert_eq!(res.header("content-type"), "video/mp4");
        assert_eq!(res.header("content-length"), VIDEO_LEN.to_string());
        assert_eq!(res.header("accept-ranges"), "bytes");
        assert!(res.header("content-disposition").starts_with("inline"));
        assert!(res.headers.get("content-range").is_none());
    }

    #[tokio::test]
    async fn malformed_range_falls_back_to_full_content() {
        let app = TestApp::spawn().await;
        let (_, path) = uploaded(&app).await;

        let res = app.get_range(&path, "bytes=abc-def").await;

        assert_eq!(res.status, 200);
        assert_eq!(res.bytes.len(), VIDEO_LEN);
    }

    #[tokio::test]
    async fn unknown_filename_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app
            .get_without_token("/api/videos/stream/does-not-exist.mp4")
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["msg"], "No file exists");
    }

    #[tokio::test]
    async fn thumbnail_is_served_with_its_image_type() {
        let app = TestApp::spawn().await;
        let (id, _) = uploaded(&app).await;

        let res = app.get_without_token(&routes::thumbnail(id)).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.header("content-type"), "image/png");
        assert_eq!(res.bytes, patterned_bytes(512));
    }

    #[tokio::test]
    async fn thumbnail_of_unknown_video_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(&routes::thumbnail(777)).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["msg"], "Video not found");
    }
}

mod ranges {
    use super::*;

    #[tokio::test]
    async fn leading_range_is_partial_content() {
        let app = TestApp::spawn().await;
        let (_, path) = uploaded(&app).await;

        let res = app.get_range(&path, "bytes=0-99").await;

        assert_eq!(res.status, 206);
        assert_eq!(res.header("content-range"), format!("bytes 0-99/{VIDEO_LEN}"));
        assert_eq!(res.header("content-length"), "100");
        assert_eq!(res.bytes, &patterned_bytes(VIDEO_LEN)[..100]);
    }

    #[tokio::test]
    async fn range_spanning_chunks_is_stitched_together() {
        let app = TestApp::spawn().await;
        let (_, path) = uploaded(&app).await;
        let start = TEST_CHUNK_SIZE - 10;
        let end = 3 * TEST_CHUNK_SIZE + 5;

        let res = app.get_range(&path, &format!("bytes={start}-{end}")).await;

        assert_eq!(res.status, 206);
        assert_eq!(res.bytes, &patterned_bytes(VIDEO_LEN)[start..=end]);
    }

    #[tokio::test]
    async fn open_ended_range_runs_to_the_end() {
        let app = TestApp::spawn().await;
        let (_, path) = uploaded(&app).await;

        let res = app.get_range(&path, "bytes=4000-").await;

        assert_eq!(res.status, 206);
        assert_eq!(
            res.header("content-range"),
            format!("bytes 4000-{}/{VIDEO_LEN}", VIDEO_LEN - 1)
        );
        assert_eq!(res.bytes, &patterned_bytes(VIDEO_LEN)[4000..]);
    }

    #[tokio::test]
    async fn suffix_range_serves_the_tail() {
        let app = TestApp::spawn().await;
        let (_, path) = uploaded(&app).await;

        let res = app.get_range(&path, "bytes=-10").await;

        assert_eq!(res.status, 206);
        assert_eq!(res.bytes, &patterned_bytes(VIDEO_LEN)[VIDEO_LEN - 10..]);
    }

    #[tokio::test]
    async fn end_past_the_file_is_clamped() {
        let app = TestApp::spawn().await;
        let (_, path) = uploaded(&app).await;

        let res = app.get_range(&path, "bytes=4990-999999").await;

        assert_eq!(res.status, 206);
        assert_eq!(res.bytes.len(), 10);
    }

    #[tokio::test]
    async fn range_beyond_the_file_is_not_satisfiable() {
        let app = TestApp::spawn().await;
        let (_, path) = uploaded(&app).await;

        let res = app.get_range(&path, &format!("bytes={VIDEO_LEN}-")).await;

        assert_eq!(res.status, 416);
        assert_eq!(res.header("content-range"), format!("bytes */{VIDEO_LEN}"));
    }
}
