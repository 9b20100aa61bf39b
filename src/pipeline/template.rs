//! Default document template.
//!
//! Synthesised when no live document exists, or when the existing one has
//! no identifiable sections to tend. Every region carries an explicit id
//! so the first real cycle can address it, and the modifications log is
//! present from birth.

/// The bootstrap document.
pub const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Euler's Identity</title>
    <style>
        body { font-family: 'Arial', sans-serif; line-height: 1.6; margin: 0; color: #333; background-color: #f8f8f8; }
        .container { max-width: 1200px; margin: 0 auto; padding: 2rem; }
        header { text-align: center; padding: 2rem 0; }
        .content { background-color: white; padding: 2rem; border-radius: 5px; box-shadow: 0 2px 5px rgba(0,0,0,0.1); }
        .modifications { margin-top: 2rem; padding-top: 1rem; border-top: 1px solid #eee; }
        .modification { margin-bottom: 1.5rem; padding-bottom: 1.5rem; border-bottom: 1px dashed #eee; }
        .timestamp { font-size: 0.8rem; color: #999; }
        footer { text-align: center; padding: 1rem 0; margin-top: 2rem; font-size: 0.9rem; color: #777; }
    </style>
</head>
<body>
<header id="masthead">
    <h1>Euler's Identity</h1>
    <p>e<sup>i&pi;</sup> + 1 = 0</p>
</header>
<div id="content" class="container content">
    <p>The future of mankind among the stars is driven by a continued investigation into the mysteries of nature and an application of the principles and ideas derived therefrom.</p>
    <p>Euler's Identity, LLC is a company striving to relentlessly push the boundaries of technology, harnessing the power of mathematics to unleash liberty and prosperity for all.</p>
</div>
<div id="evolving-thoughts" class="container modifications">
    <h2>Evolving Thoughts</h2>
    <!-- engine-authored entries land here -->
</div>
<footer id="colophon">
    <p>&copy; Euler's Identity, LLC. All rights reserved.</p>
</footer>
</body>
</html>
"#;

// =============================================================================
// Tests
// =============================================================================
