//! Selectors and page scripts for the collection-building surface.

/// Opens `arguments[0]` in a new tab.
pub const OPEN_TAB: &str = "window.open(arguments[0], '_blank');";

pub const CLICK: &str = "arguments[0].click();";

pub const SCROLL_INTO_VIEW: &str = "arguments[0].scrollIntoView({block:'center'});";

/// Sets a text field's value and fires the events the page listens to.
pub const SET_VALUE: &str = r#"
    const el = arguments[0];
    el.value = arguments[1];
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
"#;

pub const SCROLL_TO_BOTTOM: &str =
    "window.scrollTo({top: document.documentElement.scrollHeight, behavior: 'smooth'});";

pub const SCROLL_HEIGHT: &str = "return document.documentElement.scrollHeight;";

/// Text of the extension's "<selected> / <total>" indicator, or null.
pub const SELECTION_TEXT: &str = r#"
    const el = document.querySelector("yt-formatted-string#selection");
    return el ? el.textContent : null;
"#;

pub const SELECT_ALL_BUTTON: &str = r#"
    const icon = document.querySelector("yt-icon[icon='msfy:msfy-select-all']");
    if (!icon) return null;
    return icon.closest('button');
"#;

pub const ACTION_MENU_BUTTON: &str = r#"
    const icon = document.querySelector("yt-icon[icon='more_vert']");
    if (!icon) return null;
    return icon.closest('button');
"#;

pub const PUBLIC_OPTION: &str = r#"
    const nodes = Array.from(document.querySelectorAll('span, yt-formatted-string, div'));
    return nodes.find(el => {
        const t = el.textContent.trim();
        return t === 'Public' || t === 'Công khai';
    }) || null;
"#;

/// href of the most recently rendered collection link, or null.
pub const LAST_COLLECTION_LINK: &str = r#"
    const links = Array.from(document.querySelectorAll("a[href^='/playlist?list=']"));
    if (!links.length) return null;
    return links[links.length - 1].href;
"#;

pub const EXTENSION_BUTTON: &str = "div[id^='msfy-toggle-bar-button-'] yt-icon-button button";

pub const SEARCH_INPUT_NAME: &str = "search_query";

pub const ADD_TO_COLLECTION_BUTTON: &str = "div#msfy-action-add-to-playlist";

pub const NEW_COLLECTION_LABELS: [&str; 2] = ["New playlist", "Danh sách phát mới"];

pub const TITLE_CONTAINER: &str = "div.ytStandardsTextareaShapeTextareaContainer";

pub const TITLE_PLACEHOLDERS: [&str; 2] = ["Choose a title", "Chọn một tiêu đề"];

pub const VISIBILITY_DROPDOWN: &str = "div.ytDropdownViewModelDropdownContainer[role='combobox']";

/// (cancel label, create label) pairs of the creation dialog footer.
pub const CREATE_BUTTON_LABELS: [(&str, &str); 2] = [("Cancel", "Create"), ("Hủy", "Tạo")];

pub fn new_collection_xpath(label: &str) -> String {
    format!(
        "//button[.//span[contains(normalize-space(.), '{}')]]",
        label
    )
}

pub fn title_input_selector(placeholder: &str) -> String {
    format!("textarea[placeholder='{}']", placeholder)
}

pub fn create_button_xpath(cancel: &str, create: &str) -> String {
    format!(
        "//button[@aria-label='{}']/ancestor::div[contains(@class,'yt-spec-dialog-layout__dialog-layout-footer-container')]//button[@aria-label='{}']",
        cancel, create
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xpaths() {
        assert_eq!(
            new_collection_xpath("New playlist"),
            "//button[.//span[contains(normalize-space(.), 'New playlist')]]"
        );
        assert!(create_button_xpath("Hủy", "Tạo").ends_with("//button[@aria-label='Tạo']"));
        assert_eq!(
            title_input_selector("Choose a title"),
            "textarea[placeholder='Choose a title']"
        );
    }
}
