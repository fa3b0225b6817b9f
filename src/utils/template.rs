//! String template rendering utilities.

pub struct TemplateVars;

impl TemplateVars {
    pub const HOST: &'static str = "host";
    pub const USER: &'static str = "user";
    pub const PORT: &'static str = "port";
    pub const REMOTE_DIR: &'static str = "remoteDir";
}

pub fn render(template: &str, variables: &[(&str, &str)]) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}

pub fn is_present(template: &str, key: &str) -> bool {
    let placeholder = format!("{{{{{}}}}}", key);
    template.contains(&placeholder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_replaces_every_occurrence() {
        let out = render(
            "rsync {{host}}:{{remoteDir}} && echo {{host}}",
            &[(TemplateVars::HOST, "10.0.0.5"), (TemplateVars::REMOTE_DIR, "/srv/app")],
        );
        assert_eq!(out, "rsync 10.0.0.5:/srv/app && echo 10.0.0.5");
    }

    #[test]
    fn render_leaves_unknown_placeholders() {
        assert_eq!(render("{{other}}", &[(TemplateVars::HOST, "h")]), "{{other}}");
        assert!(is_present("cd {{remoteDir}}", TemplateVars::REMOTE_DIR));
        assert!(!is_present("cd /srv", TemplateVars::REMOTE_DIR));
    }
}
