use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use draw_scrap::normalize::SCORE_RANGES;
use draw_scrap::process::{process_draw, Outcome};
use draw_scrap::request::{Page, PageLauncher};
use draw_scrap::store::{CsvStore, DrawStore, Upsert};
use draw_scrap::{Result, Target};
use tempfile::tempdir;

const HEADER: &str = "Date,0-300,301-350,351-400,401-410,411-420,421-430,431-440,441-450,451-460,461-470,471-480,481-490,491-500,501-600,601-1200,Total";

/// Hands out the queued pages one launch at a time, repeating the last one.
struct FakeBrowser {
    pages: Mutex<Vec<String>>,
    launches: AtomicUsize,
}

struct FakePage(String);

impl FakeBrowser {
    fn new(pages: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(pages),
            launches: AtomicUsize::new(0),
        })
    }
}

impl PageLauncher for FakeBrowser {
    type Page = FakePage;

    fn launch(&self) -> Result<FakePage> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let mut pages = self.pages.lock().unwrap();
        let html = if pages.len() > 1 { pages.remove(0) } else { pages[0].clone() };
        Ok(FakePage(html))
    }
}

impl Page for FakePage {
    fn load(&self, _url: &str) -> Result<()> {
        Ok(())
    }

    fn expand(&self, _selector: &str) -> Result<()> {
        Ok(())
    }

    fn wait_for_rows(&self, _selector: &str) -> Result<()> {
        Ok(())
    }

    fn html(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

fn draws_page(rows: &[(&str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(range, count)| format!("<tr>\n<td>{range}</td>\n<td>{count}</td>\n</tr>"))
        .collect();
    format!(
        r#"<!DOCTYPE html><html><body><main>
        <details><summary>CRS score distribution of candidates in the pool</summary>
        <div class="table-responsive"><table class="table">
        <thead><tr><th>CRS score range</th><th>Number of candidates</th></tr></thead>
        <tbody>{body}</tbody>
        </table></div></details>
        </main></body></html>"#
    )
}

fn target() -> Target {
    Target {
        settle_delay: Duration::ZERO,
        ..Target::default()
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
}

#[tokio::test]
async fn first_run_creates_the_csv() {
    let dir = tempdir().unwrap();
    let store = CsvStore::new(dir.path().join("data.csv"));
    let browser = FakeBrowser::new(vec![draws_page(&[
        ("601-1200", "56"),
        ("451-460", "1,234"),
        ("Total", "1,290"),
    ])]);

    let outcome = process_draw(browser, &store, target(), day(1)).await.unwrap();

    assert_eq!(outcome, Outcome::Written(Upsert::Created));
    let text = fs::read_to_string(store.path()).unwrap();
    assert_eq!(
        text,
        format!("{HEADER}\n2024-07-01,0,0,0,0,0,0,0,0,1234,0,0,0,0,0,56,1290\n")
    );
}

#[tokio::test]
async fn same_day_rerun_leaves_one_line() {
    let dir = tempdir().unwrap();
    let store = CsvStore::new(dir.path().join("data.csv"));
    let page = draws_page(&[("0-300", "1,000"), ("501-600", "20")]);

    process_draw(FakeBrowser::new(vec![page.clone()]), &store, target(), day(1))
        .await
        .unwrap();
    let first = fs::read_to_string(store.path()).unwrap();

    let outcome = process_draw(FakeBrowser::new(vec![page]), &store, target(), day(1))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Written(Upsert::Updated));
    assert_eq!(fs::read_to_string(store.path()).unwrap(), first);
}

#[tokio::test]
async fn later_scrape_replaces_today_and_keeps_older_days() {
    let dir = tempdir().unwrap();
    let store = CsvStore::new(dir.path().join("data.csv"));

    process_draw(FakeBrowser::new(vec![draws_page(&[("0-300", "5")])]), &store, target(), day(1))
        .await
        .unwrap();
    process_draw(FakeBrowser::new(vec![draws_page(&[("0-300", "6")])]), &store, target(), day(2))
        .await
        .unwrap();
    let day_one_line = fs::read_to_string(store.path()).unwrap().lines().nth(1).unwrap().to_owned();

    let outcome = process_draw(FakeBrowser::new(vec![draws_page(&[("0-300", "7")])]), &store, target(), day(2))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Written(Upsert::Updated));
    let text = fs::read_to_string(store.path()).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], day_one_line);
    assert_eq!(store.get(day(2)).unwrap().unwrap().count_for("0-300"), Some(7));
}

#[tokio::test]
async fn empty_pages_never_touch_the_store() {
    let dir = tempdir().unwrap();
    let store = CsvStore::new(dir.path().join("data.csv"));
    let browser = FakeBrowser::new(vec![draws_page(&[])]);

    let outcome = process_draw(browser.clone(), &store, target(), day(1)).await.unwrap();

    assert_eq!(outcome, Outcome::NoData { attempts: 11 });
    assert_eq!(browser.launches.load(Ordering::SeqCst), 11);
    assert!(!store.path().exists());
}

#[tokio::test]
async fn writes_the_first_non_empty_attempt() {
    let dir = tempdir().unwrap();
    let store = CsvStore::new(dir.path().join("data.csv"));
    let mut pages = vec![draws_page(&[]); 9];
    pages.push(draws_page(&[("491-500", "3,210")]));
    pages.push(draws_page(&[("491-500", "1")]));
    let browser = FakeBrowser::new(pages);

    let outcome = process_draw(browser.clone(), &store, target(), day(3)).await.unwrap();

    assert_eq!(outcome, Outcome::Written(Upsert::Created));
    assert_eq!(browser.launches.load(Ordering::SeqCst), 10);
    let record = store.get(day(3)).unwrap().unwrap();
    assert_eq!(record.count_for("491-500"), Some(3210));
    assert_eq!(record.total(), 3210);
    assert_eq!(record.counts().len(), SCORE_RANGES.len());
}
