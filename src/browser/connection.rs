use std::time::Duration;

use anyhow::Result;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// 作业页面的路径特征
const QUIZ_PATH_MARKERS: [&str; 2] = ["/writePaper/busywork/", "/lookPaper/busywork/"];

/// 连接到已打开的浏览器并找到作业页面
///
/// 优先使用地址包含作业路径的标签页；找不到时新开一个页面并导航到 `target_url`。
pub async fn connect_to_quiz_page(port: u16, target_url: &str) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        e
    })?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(Duration::from_millis(300)).await;

    let pages = browser.pages().await?;
    debug!("获取到 {} 个页面", pages.len());

    for page in pages.iter() {
        if let Ok(Some(url)) = page.url().await {
            debug!("检查页面: {}", url);
            if QUIZ_PATH_MARKERS.iter().any(|m| url.contains(m)) {
                info!("✓ 找到作业页面: {}", url);
                return Ok((browser, page.clone()));
            }
        }
    }

    debug!("未找到作业页面，创建新页面并导航到: {}", target_url);
    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建新页面失败: {}", e);
        e
    })?;
    page.goto(target_url).await.map_err(|e| {
        error!("导航到 {} 失败: {}", target_url, e);
        e
    })?;
    info!("已导航到: {}，请在该页面打开作业后重新运行", target_url);

    Ok((browser, page))
}
