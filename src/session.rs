/*
   Azure Entra ID SAML sign-in implementation
   Copyright (C) David Mulder <dmulder@samba.org> 2025

   This program is free software: you can redistribute it and/or modify
   it under the terms of the GNU Lesser General Public License as published by
   the Free Software Foundation, either version 3 of the License, or
   (at your option) any later version.

   This program is distributed in the hope that it will be useful,
   but WITHOUT ANY WARRANTY; without even the implied warranty of
   MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
   GNU Lesser General Public License for more details.

   You should have received a copy of the GNU Lesser General Public License
   along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::redirect::Policy;
use reqwest::{Client, IntoUrl, Response};

use crate::error::AuthError;

/// One cookie-bearing HTTP conversation with AAD.
///
/// Every request shares a single cookie jar. Redirect following is a
/// session-wide switch: AAD hands out 302s whose Location must sometimes be
/// observed rather than chased, and reqwest fixes the redirect policy per
/// client, so two clients are built over the same jar and the switch selects
/// which one serves the next request.
pub struct HttpSession {
    following: Client,
    non_following: Client,
    follow_redirects: AtomicBool,
}

impl HttpSession {
    pub fn new(skip_verify: bool) -> Result<Self, AuthError> {
        let jar = Arc::new(Jar::default());

        let following = Client::builder()
            .cookie_provider(jar.clone())
            .danger_accept_invalid_certs(skip_verify)
            .user_agent(env!("CARGO_PKG_NAME"))
            .build()
            .map_err(|e| AuthError::Transport(format!("{}", e)))?;

        let non_following = Client::builder()
            .cookie_provider(jar)
            .redirect(Policy::none())
            .danger_accept_invalid_certs(skip_verify)
            .user_agent(env!("CARGO_PKG_NAME"))
            .build()
            .map_err(|e| AuthError::Transport(format!("{}", e)))?;

        Ok(HttpSession {
            following,
            non_following,
            follow_redirects: AtomicBool::new(true),
        })
    }

    /// The client serving the next request under the current redirect switch.
    pub fn client(&self) -> &Client {
        if self.follows_redirects() {
            &self.following
        } else {
            &self.non_following
        }
    }

    pub async fn get<U: IntoUrl>(&self, url: U) -> Result<Response, AuthError> {
        self.client()
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::Transport(format!("{}", e)))
    }

    pub fn follows_redirects(&self) -> bool {
        self.follow_redirects.load(Ordering::Relaxed)
    }

    pub fn disable_follow_redirect(&self) {
        self.follow_redirects.store(false, Ordering::Relaxed);
    }

    pub fn enable_follow_redirect(&self) {
        self.follow_redirects.store(true, Ordering::Relaxed);
    }

    /// Turn redirect following off for the lifetime of the guard. The prior
    /// state comes back when the guard drops, on every exit path.
    pub fn redirects_disabled(&self) -> RedirectGuard<'_> {
        let prior = self.follow_redirects.swap(false, Ordering::Relaxed);
        RedirectGuard {
            session: self,
            prior,
        }
    }
}

pub struct RedirectGuard<'a> {
    session: &'a HttpSession,
    prior: bool,
}

impl Drop for RedirectGuard<'_> {
    fn drop(&mut self) {
        self.session
            .follow_redirects
            .store(self.prior, Ordering::Relaxed);
    }
}
