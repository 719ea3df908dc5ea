use serde::Deserialize;

const MAX_EMAIL_LEN: usize = 254;

#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    pub csrf_token: String,
    pub email: String,
}

impl LoginData {
    pub fn validate(&self) -> bool {
        let email = self.email.trim();
        if email.is_empty() || email.len() > MAX_EMAIL_LEN {
            return false;
        }
        match email.split_once('@') {
            Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
            None => false,
        }
    }
}
