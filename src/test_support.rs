use axum::Router;
use tokio::task::JoinHandle;

/// Bind `router` on an ephemeral local port and return its base URL
/// (no trailing slash) together with the server task.
pub async fn serve(router: Router) -> (String, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let address = listener.local_addr().expect("local addr should exist");
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server should run");
    });
    (format!("http://{address}"), handle)
}

pub fn rss_with_items(title: &str, site: &str, image: Option<&str>, items: &[(&str, &str, &str)]) -> String {
    let image = image
        .map(|url| format!("<image><url>{url}</url><title>{title}</title><link>{site}</link></image>"))
        .unwrap_or_default();
    let items: String = items
        .iter()
        .map(|(item_title, link, date)| {
            format!("<item><title>{item_title}</title><link>{link}</link><pubDate>{date}</pubDate></item>")
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>{title}</title><link>{site}</link><description>test</description>{image}{items}</channel></rss>"#
    )
}
