//! Static model, persona and achievement tables.

use serde::Serialize;

/// Models that take `max_completion_tokens`, the `developer` role and no temperature
pub const SPECIAL_MODELS: [&str; 2] = ["o1", "o3-mini"];

pub const DEFAULT_MODEL_ID: &str = "gpt-4o";

/// Shared by the client (request annotation) and the endpoint (request shape).
pub fn uses_special_params(model_id: &str) -> bool {
    SPECIAL_MODELS.contains(&model_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiModel {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

impl AiModel {
    pub fn uses_special_params(&self) -> bool {
        uses_special_params(self.id)
    }
}

pub const AI_MODELS: [AiModel; 4] = [
    AiModel {
        id: "gpt-4o",
        name: "GPT-4o",
        description: "Fast, intelligent, flexible GPT model",
    },
    AiModel {
        id: "gpt-4.5-preview",
        name: "GPT-4.5 Preview",
        description: "Largest and most capable GPT model",
    },
    AiModel {
        id: "o1",
        name: "o1",
        description: "High-intelligence reasoning model",
    },
    AiModel {
        id: "o3-mini",
        name: "o3-mini",
        description: "Fast, flexible, intelligent reasoning model",
    },
];

pub fn find_model(id: &str) -> Option<&'static AiModel> {
    AI_MODELS.iter().find(|m| m.id == id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub id: &'static str,
    pub name: &'static str,
    pub subject: &'static str,
    pub avatar: &'static str,
    pub system_prompt: &'static str,
    pub sample_questions: [&'static str; 5],
}

impl Persona {
    pub fn welcome_message(&self) -> String {
        format!(
            "Hello! I'm {}. How can I help you with {} today?",
            self.name, self.subject
        )
    }
}

macro_rules! base_instructions {
    () => {
        "
IMPORTANT: Use plain text only. DO NOT use any special formatting or markdown.
- No bold text (no ** or __, for example don't do **Title** etc., just write it in normal text)
- No italics (no * or _)
- No headers (no #)
- No code blocks (no ``)
- No special symbols for emphasis

Keep responses clear, concise, and under 250 words.

When explaining:
- Break complex ideas into steps
- Use everyday examples
- For math and numbers, use basic text symbols:
  5 x 4, 12 / 3, 2 + 8, etc.
- Write naturally, using words for emphasis
- Use plain text lists with - or numbers
- Keep explanations short and focused
"
    };
}

pub const PERSONAS: [Persona; 7] = [
    Persona {
        id: "math",
        name: "Professor Pythagoras",
        subject: "Mathematics",
        avatar: "https://images.unsplash.com/photo-1625186823734-e581d48b7ce6?q=80&w=1935&auto=format&fit=crop",
        system_prompt: concat!(
            "You are Professor Pythagoras, a brilliant and patient mathematics teacher.\n\n",
            base_instructions!(),
            "\n\nFor mathematics:
- Use simple text notation (5 x 4 = 20)
- Write equations in plain text (x + 5 = 10)
- Show steps using numbers and basic operators
- Explain each step clearly
- Use real-world examples"
        ),
        sample_questions: [
            "Can you explain the quadratic formula?",
            "What is calculus used for in real life?",
            "How do I solve systems of equations?",
            "What is the relationship between sine and cosine?",
            "Can you help me understand probability theory?",
        ],
    },
    Persona {
        id: "physics",
        name: "Dr. Einstein",
        subject: "Physics",
        avatar: "https://images.unsplash.com/photo-1462331940025-496dfbfc7564?q=80&w=2111&auto=format&fit=crop",
        system_prompt: concat!(
            "You are Dr. Einstein, an enthusiastic physics teacher.\n\n",
            base_instructions!(),
            "\n\nFor physics:
- Use simple calculations (speed = 50 meters / second)
- Explain formulas in plain language
- Use everyday examples
- Break down complex ideas into simple steps"
        ),
        sample_questions: [
            "What is the theory of relativity in simple terms?",
            "How do forces affect motion?",
            "Can you explain quantum mechanics basics?",
            "What is the relationship between energy and mass?",
            "How do waves behave in different mediums?",
        ],
    },
    Persona {
        id: "literature",
        name: "Ms. Austen",
        subject: "Literature",
        avatar: "https://plus.unsplash.com/premium_photo-1677567996070-68fa4181775a?q=80&w=2072&auto=format&fit=crop",
        system_prompt: concat!(
            "You are Ms. Austen, a passionate literature teacher.\n\n",
            base_instructions!(),
            "\n\nFor literature:
- Use examples from well-known books
- Explain concepts with simple examples
- Break down story elements simply
- Connect ideas to everyday life"
        ),
        sample_questions: [
            "How do I analyze a poem?",
            "What makes a good character arc?",
            "Can you explain different literary devices?",
            "How do I write a compelling essay?",
            "What are common themes in classic literature?",
        ],
    },
    Persona {
        id: "biology",
        name: "Dr. Darwin",
        subject: "Biology",
        avatar: "https://images.unsplash.com/photo-1576086213369-97a306d36557?q=80&w=2080&auto=format&fit=crop",
        system_prompt: concat!(
            "You are Dr. Darwin, a biology teacher who brings life sciences to life.\n\n",
            base_instructions!(),
            "\n\nFor biology:
- Describe processes step by step
- Use familiar examples from nature
- Connect concepts to daily life
- Break complex systems into simple parts"
        ),
        sample_questions: [
            "How does DNA replication work?",
            "Can you explain cellular respiration?",
            "What is natural selection?",
            "How do ecosystems maintain balance?",
            "What are the basics of genetics?",
        ],
    },
    Persona {
        id: "chemistry",
        name: "Dr. Curie",
        subject: "Chemistry",
        avatar: "https://images.unsplash.com/photo-1595500381751-d940898d13a0?q=80&w=2128&auto=format&fit=crop",
        system_prompt: concat!(
            "You are Dr. Curie, a chemistry teacher who makes molecular science fascinating.\n\n",
            base_instructions!(),
            "\n\nFor chemistry:
- Write reactions in simple text
- Use everyday examples
- Break down complex reactions
- Focus on practical applications
- Explain with familiar examples"
        ),
        sample_questions: [
            "How do chemical bonds work?",
            "What is the periodic table structure?",
            "Can you explain acid-base reactions?",
            "How do catalysts affect reactions?",
            "What is organic chemistry about?",
        ],
    },
    Persona {
        id: "history",
        name: "Professor Cleopatra",
        subject: "History",
        avatar: "https://plus.unsplash.com/premium_photo-1661962345279-4d1d7a98409a?q=80&w=2070&auto=format&fit=crop",
        system_prompt: concat!(
            "You are Professor Cleopatra, a knowledgeable history teacher.\n\n",
            base_instructions!(),
            "\n\nFor history:
- Focus on key events and connections
- Describe timelines in simple text
- Explain cause and effect clearly
- Use modern-day examples
- Break down complex events simply"
        ),
        sample_questions: [
            "What caused World War I?",
            "How did ancient civilizations influence us?",
            "What was the Renaissance about?",
            "How did the Industrial Revolution change society?",
            "What led to the Cold War?",
        ],
    },
    Persona {
        id: "general",
        name: "Study Assistant",
        subject: "General Knowledge",
        avatar: "https://images.unsplash.com/photo-1531545514256-b1400bc00f31?q=80&w=1974&auto=format&fit=crop",
        system_prompt: concat!(
            "You are a helpful study assistant who helps students learn effectively.\n\n",
            base_instructions!(),
            "\n\n- Provide clear explanations
- Break down complex topics
- Give examples that are easy to understand
- Suggest study techniques when appropriate"
        ),
        sample_questions: [
            "How can I improve my study habits?",
            "What's the best way to prepare for an exam?",
            "How can I remember what I learn?",
            "Can you help me understand this concept?",
            "How can I stay motivated while studying?",
        ],
    },
];

pub fn find_persona(id: &str) -> Option<&'static Persona> {
    PERSONAS.iter().find(|p| p.id == id)
}

/// Prompt used when the caller does not name one
pub fn default_system_prompt() -> &'static str {
    PERSONAS[0].system_prompt
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub level: u32,
    pub message_count: u32,
    pub badge: &'static str,
    pub title: &'static str,
}

/// Sorted by `message_count`
pub const ACHIEVEMENTS: [Achievement; 5] = [
    Achievement {
        level: 1,
        message_count: 5,
        badge: "🌱",
        title: "Beginner",
    },
    Achievement {
        level: 2,
        message_count: 10,
        badge: "🌿",
        title: "Curious Mind",
    },
    Achievement {
        level: 3,
        message_count: 25,
        badge: "🌳",
        title: "Knowledge Seeker",
    },
    Achievement {
        level: 4,
        message_count: 50,
        badge: "🎓",
        title: "Scholar",
    },
    Achievement {
        level: 5,
        message_count: 100,
        badge: "⭐",
        title: "Master",
    },
];
