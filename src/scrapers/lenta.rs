//! Lenta.ru article scraper.
//!
//! Categories come from the top navigation menu, article links from the
//! feature and regular grids of each rubric page. Article headers carry a
//! Russian textual timestamp such as `14:32, 16 октября 2026`.

use scraper::Html;
use tracing::debug;
use url::Url;

use crate::errors::SourceError;
use crate::scrapers::site::{
    ArticleLink, ArticlePage, Category, SiteLayout, element_text, selector, text_without,
};
use crate::utils::resolve_link;

/// Menu entry that points back at the front page rather than a rubric.
const SKIPPED_CATEGORY: &str = "Главное";

/// Inserts inside the article body that are not part of the text.
const BODY_INSERTS: [&str; 6] = [
    "a.topic-body__origin",
    "div.topic-body__title-image",
    "div.js-scroll-to-site-container",
    "div.box-inline-topic",
    "div.box-gallery",
    "figure.picture",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Lenta;

impl SiteLayout for Lenta {
    fn name(&self) -> &'static str {
        "lenta"
    }

    fn home(&self) -> &'static str {
        "https://lenta.ru/"
    }

    fn categories(&self, html: &str, base: &Url) -> Result<Vec<Category>, SourceError> {
        let document = Html::parse_document(html);
        let links = selector("ul.menu__nav-list li.menu__nav-item a.menu__nav-link._is-extra")?;

        let mut categories = Vec::new();
        for a in document.select(&links) {
            let name = element_text(a);
            let Some(href) = a.value().attr("href") else {
                continue;
            };
            if name == SKIPPED_CATEGORY {
                continue;
            }
            categories.push(Category {
                name,
                link: resolve_link(base, href)?,
            });
        }
        debug!(count = categories.len(), "Parsed lenta categories");
        Ok(categories)
    }

    fn article_links(&self, html: &str, base: &Url) -> Result<Vec<ArticleLink>, SourceError> {
        let document = Html::parse_document(html);
        let links = selector(
            "div.rubric-page__container div.longgrid-feature-list a[href], \
             div.rubric-page__container div.longgrid-list a[href]",
        )?;

        let mut out = Vec::new();
        for a in document.select(&links) {
            if let Some(href) = a.value().attr("href") {
                out.push(ArticleLink {
                    link: resolve_link(base, href)?,
                    title: None,
                });
            }
        }
        Ok(out)
    }

    fn article(&self, html: &str) -> Result<ArticlePage, SourceError> {
        let document = Html::parse_document(html);
        let container = document
            .select(&selector("div.topic-page__container")?)
            .next()
            .ok_or(SourceError::MissingElement("div.topic-page__container"))?;

        let regular_time = selector("a.topic-header__time")?;
        let premium_time = selector("a.premium-header__time")?;
        let published_at = container
            .select(&regular_time)
            .next()
            .or_else(|| container.select(&premium_time).next())
            .map(element_text)
            .unwrap_or_default();

        let title = container
            .select(&selector("h1")?)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty());

        let body = container
            .select(&selector("div.topic-body")?)
            .next()
            .ok_or(SourceError::MissingElement("div.topic-body"))?;
        let skip = BODY_INSERTS
            .into_iter()
            .map(selector)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ArticlePage {
            title,
            published_at,
            body_text: text_without(body, &skip),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse(Lenta.home()).unwrap()
    }

    #[test]
    fn test_categories_skip_front_page_entry() {
        let html = r#"
            <nav><ul class="menu__nav-list">
              <li class="menu__nav-item"><a class="menu__nav-link _is-extra" href="/">Главное</a></li>
              <li class="menu__nav-item"><a class="menu__nav-link _is-extra" href="/rubrics/russia/">Россия</a></li>
              <li class="menu__nav-item"><a class="menu__nav-link _is-extra" href="https://lenta.ru/rubrics/world/">Мир</a></li>
              <li class="menu__nav-item"><a class="menu__nav-link" href="/rubrics/other/">Не рубрика</a></li>
            </ul></nav>"#;
        let categories = Lenta.categories(html, &base()).unwrap();
        assert_eq!(
            categories,
            vec![
                Category {
                    name: "Россия".to_string(),
                    link: "https://lenta.ru/rubrics/russia/".to_string(),
                },
                Category {
                    name: "Мир".to_string(),
                    link: "https://lenta.ru/rubrics/world/".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_article_links_from_both_grids() {
        let html = r#"
            <div class="rubric-page__container">
              <div class="longgrid-feature-list"><a href="/news/2026/10/16/first/">1</a></div>
              <div class="longgrid-list">
                <a href="/news/2026/10/16/second/">2</a>
                <a href="https://lenta.ru/articles/2026/10/16/third/">3</a>
              </div>
            </div>
            <div class="longgrid-list"><a href="/outside/">x</a></div>"#;
        let links: Vec<_> = Lenta
            .article_links(html, &base())
            .unwrap()
            .into_iter()
            .map(|l| l.link)
            .collect();
        assert_eq!(
            links,
            vec![
                "https://lenta.ru/news/2026/10/16/first/",
                "https://lenta.ru/news/2026/10/16/second/",
                "https://lenta.ru/articles/2026/10/16/third/",
            ]
        );
    }

    #[test]
    fn test_article_page() {
        let html = r#"
            <div class="topic-page__container">
              <a class="topic-header__time" href="/2026/10/16/">14:32, 16 октября 2026</a>
              <h1><span>Учёные</span> нашли воду</h1>
              <div class="topic-body">
                <a class="topic-body__origin" href="/source/">Источник</a>
                <div class="topic-body__title-image"><img src="x.jpg"/>Подпись</div>
                <p class="topic-body__content-text">Первый абзац.</p>
                <div class="box-gallery">Галерея</div>
                <p class="topic-body__content-text">Второй абзац.</p>
              </div>
            </div>"#;
        let page = Lenta.article(html).unwrap();
        assert_eq!(page.title.as_deref(), Some("Учёные нашли воду"));
        assert_eq!(page.published_at, "14:32, 16 октября 2026");
        assert_eq!(page.body_text, "Первый абзац. Второй абзац.");
    }

    #[test]
    fn test_article_page_without_container() {
        let err = Lenta.article("<html><body><p>404</p></body></html>").unwrap_err();
        assert!(matches!(err, SourceError::MissingElement(_)));
    }
}
