//! HTML pages.
use gotham::helpers::http::response::create_response;
use gotham::state::State;
use http::StatusCode;
use hyper::{Body, Response};

pub mod comment;
pub mod index;
pub mod post;
pub mod user;

pub type DocumentResult = Result<Response<Body>, failure::Error>;

pub trait TemplateExt {
    fn to_response_with(&self, state: &State, status: StatusCode) -> Response<Body>;

    fn to_response(&self, state: &State) -> Response<Body> {
        self.to_response_with(state, StatusCode::OK)
    }
}

impl<T: askama::Template> TemplateExt for T {
    fn to_response_with(&self, state: &State, status: StatusCode) -> Response<Body> {
        match self.render() {
            Ok(string) => create_response(state, status, mime::TEXT_HTML_UTF_8, string),
            Err(e) => {
                log::error!("Template error: {}", e);
                create_response(
                    state,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    mime::TEXT_PLAIN,
                    format!("Template error: {}", e),
                )
            }
        }
    }
}

/// An option of an HTML select.
#[derive(Clone, Debug, PartialEq)]
pub struct Choice {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl Choice {
    /// Builds the options of a select where `chosen` is the current value. The first option picks
    /// nothing.
    pub fn list<I>(options: I, chosen: &str) -> Vec<Choice>
    where
        I: IntoIterator<Item = (i32, String)>,
    {
        let mut choices = vec![Choice {
            value: String::new(),
            label: String::from("---------"),
            selected: chosen.is_empty(),
        }];
        choices.extend(options.into_iter().map(|(id, label)| {
            let value = id.to_string();
            Choice {
                selected: value == chosen,
                value,
                label,
            }
        }));
        choices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choices_mark_selection() {
        let options = vec![(1, String::from("Travel")), (2, String::from("Food"))];
        let choices = Choice::list(options.clone(), "2");
        assert_eq!(choices.len(), 3);
        assert!(!choices[0].selected);
        assert!(choices[2].selected);
        assert_eq!(choices[2].label, "Food");

        let choices = Choice::list(options, "");
        assert!(choices[0].selected);
        assert!(choices.iter().skip(1).all(|choice| !choice.selected));
    }
}
