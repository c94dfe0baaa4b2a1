//! `kustomize build` argument assembly

use kustwrap_core::BuildOpts;

/// Build option enabling the helm chart inflation generator
pub const ENABLE_HELM_FLAG: &str = "--enable-helm";

/// True if the build options turn on helm chart inflation
pub fn is_helm_enabled(build_options: &str) -> bool {
    build_options.contains(ENABLE_HELM_FLAG)
}

/// Arguments for `kustomize build <path>`
///
/// `build_options` is split on whitespace and appended verbatim; quoting is
/// not interpreted. When helm is enabled and `helm_flags_supported` is set
/// (kustomize v5.3.0 and later), the kube version and API versions from
/// `opts` are forwarded to helm.
pub fn build_args(
    path: &str,
    build_options: &str,
    opts: Option<&BuildOpts>,
    helm_flags_supported: bool,
) -> Vec<String> {
    let mut args = vec!["build".to_string(), path.to_string()];
    if build_options.is_empty() {
        return args;
    }

    args.extend(build_options.split_whitespace().map(str::to_string));

    if let Some(opts) = opts
        && helm_flags_supported
        && is_helm_enabled(build_options)
    {
        if let Some(kube_version) = opts.kube_version.as_deref().filter(|v| !v.is_empty()) {
            args.push("--helm-kube-version".to_string());
            args.push(kube_version.to_string());
        }
        for api_version in &opts.api_versions {
            args.push("--helm-api-versions".to_string());
            args.push(api_version.clone());
        }
    }

    args
}
