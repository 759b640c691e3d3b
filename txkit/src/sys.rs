//! 코드가 붙은 공통 에러와 입력 검증 에러
//!
//! 에러 체인 어디에 있든 `get_*` 헬퍼로 찾아낼 수 있습니다.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use thiserror::Error;
use tonic::{Code, Status};

/// 메시지와 gRPC 코드를 함께 가진 에러
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{msg}")]
pub struct CommonError {
    msg: String,
    code: Code,
}

impl CommonError {
    pub fn new(msg: impl Into<String>, code: Code) -> Self {
        Self {
            msg: msg.into(),
            code,
        }
    }

    pub fn code(&self) -> Code {
        self.code
    }
}

impl From<CommonError> for Status {
    fn from(e: CommonError) -> Self {
        Status::new(e.code, e.msg)
    }
}

/// 입력 검증 에러 모음 (메시지는 JSON 배열로 렌더링)
#[derive(Error, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[error("{}", render_messages(.messages))]
pub struct ValidationErrors {
    #[serde(rename = "error_messages")]
    pub messages: Vec<String>,
}

impl ValidationErrors {
    pub fn new<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

fn render_messages(messages: &[String]) -> String {
    serde_json::to_string(messages).unwrap_or_else(|e| e.to_string())
}

/// 에러 체인에서 `T`를 찾습니다.
fn find_in_chain<'a, T>(err: &'a (dyn StdError + 'static)) -> Option<&'a T>
where
    T: StdError + 'static,
{
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<T>() {
            return Some(found);
        }
        current = e.source();
    }
    None
}

pub fn get_common_error<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a CommonError> {
    find_in_chain(err)
}

pub fn is_common_error(err: &(dyn StdError + 'static)) -> bool {
    get_common_error(err).is_some()
}

pub fn get_validation_errors<'a>(
    err: &'a (dyn StdError + 'static),
) -> Option<&'a ValidationErrors> {
    find_in_chain(err)
}

pub fn is_validation_error(err: &(dyn StdError + 'static)) -> bool {
    get_validation_errors(err).is_some()
}
