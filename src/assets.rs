//! Scripts injected into pages
//!
//! [`HELPER`] is evaluated once per execution context with the frame id as
//! its only argument. It installs its functions on `window` under the
//! per-frame namespace `"rod" + frameId` and returns `window`, whose remote
//! handle becomes the implicit receiver of later evaluations.

/// Namespace prefix of the helper functions
pub const HELPER_NAMESPACE: &str = "rod";

/// Source URL tagged on the helper so it is recognisable in devtools
pub const HELPER_SOURCE_URL: &str = "__chaser_helper__";

pub const HELPER: &str = r#"function (frameId) {
  const helper = {
    waitIdle(timeout) {
      return new Promise((resolve) => {
        window.requestIdleCallback(resolve, { timeout: timeout * 1000 })
      })
    },

    waitLoad() {
      return new Promise((resolve) => {
        if (document.readyState === 'complete') return resolve()
        window.addEventListener('load', resolve)
      })
    },

    addScriptTag(id, url, content) {
      if (document.getElementById(id)) return

      return new Promise((resolve, reject) => {
        const s = document.createElement('script')

        if (url) {
          s.src = url
          s.onload = resolve
        } else {
          s.type = 'text/javascript'
          s.text = content
          resolve()
        }

        s.id = id
        s.onerror = reject
        document.head.appendChild(s)
      })
    },

    addStyleTag(id, url, content) {
      if (document.getElementById(id)) return

      return new Promise((resolve, reject) => {
        let el

        if (url) {
          el = document.createElement('link')
          el.rel = 'stylesheet'
          el.href = url
        } else {
          el = document.createElement('style')
          el.type = 'text/css'
          el.appendChild(document.createTextNode(content))
          resolve()
        }

        el.id = id
        el.onload = resolve
        el.onerror = reject
        document.head.appendChild(el)
      })
    },

    initMouseTracer(mouseId, iconSrc) {
      if (document.getElementById(mouseId)) return

      const img = document.createElement('img')
      img.src = iconSrc
      img.id = mouseId
      img.style = `position: absolute; z-index: 2147483647; width: 17px;
        pointer-events: none; top: 0; left: 0;`
      document.body.appendChild(img)
    },

    updateMouseTracer(mouseId, x, y) {
      const img = document.getElementById(mouseId)
      if (!img) return false
      img.style.left = `${x - 2}px`
      img.style.top = `${y - 4}px`
      return true
    },
  }

  window['rod' + frameId] = helper
  return window
}"#;

/// Pointer icon shown by the mouse tracer
pub const MOUSE_POINTER: &str = "data:image/svg+xml;base64,PHN2ZyB4bWxucz0iaHR0cDovL3d3dy53My5vcmcvMjAwMC9zdmciIHZpZXdCb3g9IjAgMCAxNyAyNCI+PHBhdGggZD0iTTEgMWwxNSAxNS03IDEgNCA4LTMgMS00LTgtNSA1eiIgZmlsbD0iIzAwMCIgc3Ryb2tlPSIjZmZmIi8+PC9zdmc+";
