//! Page-level actions for steps 3 through 14.

use tracing::{debug, info};

use crate::config::AutomationConfig;
use crate::driver::{Locator, ENTER_KEY};

use super::interact::Interactor;
use super::loader::{ContentLoader, DriverSurface, LoadResult};
use super::scripts;
use super::types::StepFailure;

pub async fn open_surface(ui: &Interactor<'_>, url: &str, config: &AutomationConfig) -> Result<(), StepFailure> {
    let driver = ui.driver();
    let before = driver.window_handles().await?.len();
    driver
        .execute(scripts::OPEN_TAB, vec![serde_json::Value::from(url)])
        .await?;

    let handles = driver.window_handles().await?;
    let newest = handles
        .last()
        .ok_or_else(|| StepFailure::not_found("no browser window to switch to"))?;
    driver.switch_to_window(newest).await?;
    debug!(tabs_before = before, tabs_after = handles.len(), url, "opened surface tab");

    tokio::time::sleep(config.surface_settle()).await;
    Ok(())
}

pub async fn activate_extension(ui: &Interactor<'_>) -> Result<(), StepFailure> {
    ui.find_and_click(&Locator::css(scripts::EXTENSION_BUTTON))
        .await
        .map(|_| ())
}

pub async fn search(ui: &Interactor<'_>, term: &str) -> Result<(), StepFailure> {
    let driver = ui.driver();
    let input = ui
        .wait_for_clickable(&Locator::name(scripts::SEARCH_INPUT_NAME))
        .await?;
    ui.click(&input).await?;
    driver.send_keys(&input, term).await?;
    driver.send_keys(&input, ENTER_KEY).await?;
    debug!(term, "search submitted");
    Ok(())
}

pub async fn load_content(
    ui: &Interactor<'_>,
    target: u32,
    config: &AutomationConfig,
) -> Result<LoadResult, StepFailure> {
    tokio::time::sleep(config.load_settle()).await;

    let loader = ContentLoader::new(config.max_scroll_iterations, config.scroll_pause());
    let result = loader
        .load_until(&DriverSurface::new(ui.driver()), target)
        .await?;

    crate::metrics::SCROLL_ITERATIONS.observe(f64::from(result.iterations));
    info!(
        target,
        count = ?result.count,
        iterations = result.iterations,
        stop = ?result.stop,
        "content loaded"
    );
    Ok(result)
}

pub async fn select_all(ui: &Interactor<'_>) -> Result<(), StepFailure> {
    let button = ui
        .wait_for_script_element(scripts::SELECT_ALL_BUTTON)
        .await
        .map_err(|e| StepFailure::new(e.kind, format!("select-all button: {}", e.message)))?;
    ui.click(&button).await
}

pub async fn open_action_menu(ui: &Interactor<'_>) -> Result<(), StepFailure> {
    let button = ui
        .wait_for_script_element(scripts::ACTION_MENU_BUTTON)
        .await
        .map_err(|e| StepFailure::new(e.kind, format!("action menu button: {}", e.message)))?;
    ui.click(&button).await
}

pub async fn add_to_collection(ui: &Interactor<'_>) -> Result<(), StepFailure> {
    ui.find_and_click(&Locator::css(scripts::ADD_TO_COLLECTION_BUTTON))
        .await
        .map(|_| ())
}

/// Clicks the "new collection" button, trying each label in turn.
pub async fn new_collection(ui: &Interactor<'_>) -> Result<(), StepFailure> {
    let mut last_failure = None;
    for label in scripts::NEW_COLLECTION_LABELS {
        let locator = Locator::xpath(scripts::new_collection_xpath(label));
        match ui.find_and_click(&locator).await {
            Ok(_) => {
                debug!(label, "new collection requested");
                return Ok(());
            }
            Err(e) => {
                debug!(label, error = %e, "new collection button not found");
                last_failure = Some(e);
            }
        }
    }
    Err(last_failure.unwrap_or_else(|| StepFailure::not_found("no new collection button")))
}

pub async fn fill_title(ui: &Interactor<'_>, title: &str) -> Result<(), StepFailure> {
    for placeholder in scripts::TITLE_PLACEHOLDERS {
        match try_fill_title(ui, title, placeholder).await {
            Ok(()) => {
                debug!(title, placeholder, "collection title filled");
                return Ok(());
            }
            Err(e) => debug!(placeholder, error = %e, "title field not usable"),
        }
    }
    Err(StepFailure::not_found("could not fill the collection title"))
}

async fn try_fill_title(ui: &Interactor<'_>, title: &str, placeholder: &str) -> Result<(), StepFailure> {
    let driver = ui.driver();
    let container = ui
        .wait_for_clickable(&Locator::css(scripts::TITLE_CONTAINER))
        .await?;
    driver
        .execute(scripts::SCROLL_INTO_VIEW, vec![container.to_json()])
        .await?;
    ui.script_click(&container).await?;

    let input = driver
        .find_within(&container, &Locator::css(scripts::title_input_selector(placeholder)))
        .await?;
    driver.clear(&input).await?;
    driver.send_keys(&input, title).await?;
    driver
        .execute(
            scripts::SET_VALUE,
            vec![input.to_json(), serde_json::Value::from(title)],
        )
        .await?;
    Ok(())
}

pub async fn set_visibility_public(ui: &Interactor<'_>) -> Result<(), StepFailure> {
    ui.find_and_click(&Locator::css(scripts::VISIBILITY_DROPDOWN))
        .await?;
    let option = ui
        .wait_for_script_element(scripts::PUBLIC_OPTION)
        .await
        .map_err(|e| StepFailure::new(e.kind, format!("public option: {}", e.message)))?;
    ui.script_click(&option).await
}

pub async fn confirm_create(ui: &Interactor<'_>) -> Result<(), StepFailure> {
    for (cancel, create) in scripts::CREATE_BUTTON_LABELS {
        let locator = Locator::xpath(scripts::create_button_xpath(cancel, create));
        match ui.wait_for_clickable(&locator).await {
            Ok(button) => {
                ui.script_click(&button).await?;
                debug!(label = create, "creation confirmed");
                return Ok(());
            }
            Err(e) => debug!(label = create, error = %e, "create button not found"),
        }
    }
    Err(StepFailure::not_found("create button not found"))
}

pub async fn extract_link(ui: &Interactor<'_>, config: &AutomationConfig) -> Result<String, StepFailure> {
    tokio::time::sleep(config.link_settle()).await;
    let link = ui
        .wait_for_script_text(scripts::LAST_COLLECTION_LINK)
        .await
        .map_err(|e| StepFailure::new(e.kind, format!("collection link: {}", e.message)))?;
    Ok(link.trim().to_string())
}
