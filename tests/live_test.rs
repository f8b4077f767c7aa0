use answer_correction::browser::connect_to_quiz_page;
use answer_correction::config::Config;
use answer_correction::models::load_all_toml_files;
use answer_correction::services::{PageOracle, VerificationOracle};
use answer_correction::utils::logging;
use answer_correction::JsExecutor;

#[tokio::test]
#[ignore] // 默认忽略，需要手动运行：cargo test -- --ignored
async fn test_browser_connection() {
    logging::init(true);

    let config = Config::from_env();

    let result = connect_to_quiz_page(config.browser_debug_port, &config.target_url).await;

    assert!(result.is_ok(), "应该能够成功连接浏览器");
}

#[tokio::test]
#[ignore]
async fn test_fetch_wrong_items_from_page() {
    logging::init(true);

    let config = Config::from_env();

    // 需要浏览器里已经打开一份作业
    let (_browser, page) = connect_to_quiz_page(config.browser_debug_port, &config.target_url)
        .await
        .expect("连接浏览器失败");

    let oracle = PageOracle::new(JsExecutor::new(page), config.grading_url.clone());
    let wrong = oracle.fetch_wrong_items().await.expect("获取批改结果失败");

    for item in &wrong {
        println!("❌ {} [{}] 已作答: {}", item.id, item.question_type, item.wrong_answer);
    }
}

#[tokio::test]
#[ignore]
async fn test_load_items_folder() {
    logging::init(true);

    let config = Config::from_env();

    let sets = load_all_toml_files(&config.items_folder)
        .await
        .expect("加载题目文件失败");

    for set in sets {
        println!("📄 {}: {} 道题目, {} 个别名", set.name, set.items.len(), set.aliases.len());
    }
}
