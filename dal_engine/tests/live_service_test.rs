mod helpers;

use dal_engine::DalConnection;
use helpers::get_test_cone_url;

/// Fetches raw VOTable text from a real cone search service. Only the
/// transport and query URL are exercised; the text is not decoded.
#[test]
#[ignore]
fn test_live_cone_search_fetch() {
    let Some(url) = get_test_cone_url() else {
        eprintln!("Skipping live test: DAL_TEST_CONE_URL not set");
        return;
    };
    let _ = env_logger::builder().is_test(true).try_init();

    let mut conn = DalConnection::open_cone(&url, "1.03").expect("open");
    let query = conn.cone_query(10.684, 41.269, 0.05).expect("query");
    let query_url = conn.query_url(query).expect("query url");
    assert!(query_url.contains("RA=10.684&DEC=41.269&SR=0.05"), "{}", query_url);

    let text = match conn.execute_document_text(query) {
        Ok(text) => text,
        Err(err) => panic!("fetch failed: {} (code {})", err, err.code()),
    };
    assert!(text.contains("VOTABLE"), "not a VOTable: {:.200}", text);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("cone.vot");
    let written = conn.access_data(query, &path).expect("download");
    assert!(written > 0);
}
