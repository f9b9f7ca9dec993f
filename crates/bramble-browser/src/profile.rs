use rand::Rng;

/// Launch identity for the browser context.
#[derive(Debug, Clone)]
pub struct LaunchProfile {
    pub user_agent: String,
    pub window_width: u32,
    pub window_height: u32,
    pub headless: bool,
    pub navigation_timeout_secs: u64,
}

impl Default for LaunchProfile {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            window_width: 1366,
            window_height: 768,
            headless: true,
            navigation_timeout_secs: 30,
        }
    }
}

impl LaunchProfile {
    /// Generate a profile with a randomized desktop identity.
    #[must_use]
    pub fn randomized() -> Self {
        let mut rng = rand::thread_rng();

        // Common desktop user agents
        let user_agents = [
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        ];

        // Common viewport sizes
        let viewports = [(1920, 1080), (1366, 768), (1536, 864), (1440, 900)];

        let ua_idx = rng.gen_range(0..user_agents.len());
        let vp_idx = rng.gen_range(0..viewports.len());
        let (width, height) = viewports[vp_idx];

        Self {
            user_agent: user_agents[ua_idx].to_string(),
            window_width: width,
            window_height: height,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile() {
        let profile = LaunchProfile::default();
        assert!(profile.headless);
        assert!(!profile.user_agent.is_empty());
        assert!(profile.navigation_timeout_secs > 0);
    }

    #[test]
    fn test_randomized_variation() {
        let profiles: Vec<_> = (0..10).map(|_| LaunchProfile::randomized()).collect();

        let first_ua = &profiles[0].user_agent;
        let all_same = profiles.iter().all(|p| &p.user_agent == first_ua);
        assert!(!all_same, "Expected variation in user agents");
    }
}
