// Build script shipped inside the archive. Remuxes the local playlist with ffmpeg
// and removes the segment files afterwards.

const MANIFEST_PLACEHOLDER: &str = "{{MANIFEST}}";
const OUTPUT_PLACEHOLDER: &str = "{{OUTPUT}}";

const BUILD_SCRIPT_TEMPLATE: &str = r#"#!/bin/sh
# Rebuilds "{{OUTPUT}}" from the segments listed in "{{MANIFEST}}".
# Requires ffmpeg on PATH.
set -e

cd "$(dirname "$0")"

MANIFEST='{{MANIFEST}}'
OUTPUT='{{OUTPUT}}'

if ! command -v ffmpeg >/dev/null 2>&1; then
    echo "ffmpeg not found on PATH" >&2
    exit 1
fi

ffmpeg -hide_banner -y \
    -allowed_extensions ALL \
    -protocol_whitelist file,crypto \
    -i "$MANIFEST" \
    -c copy "$OUTPUT"

# Remove init segments, then media segments.
sed -n 's/.*[Uu][Rr][Ii]="\([^"]*\)".*/\1/p' "$MANIFEST" | grep -v '^$' | while IFS= read -r f; do
    rm -f -- "$f"
done
grep -v '^#' "$MANIFEST" | tr -d '\r' | while IFS= read -r f; do
    [ -n "$f" ] && rm -f -- "$f"
done

echo "Wrote $OUTPUT"
"#;

/// Renders the build script for `manifest_name`, producing `output_name`.
///
/// Both names are expected to be sanitized filenames, so they never contain
/// quotes or path separators.
pub fn render_build_script(manifest_name: &str, output_name: &str) -> String {
    BUILD_SCRIPT_TEMPLATE
        .replace(MANIFEST_PLACEHOLDER, manifest_name)
        .replace(OUTPUT_PLACEHOLDER, output_name)
}
